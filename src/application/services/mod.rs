pub mod trading_service;

#[cfg(test)]
mod trading_service_tests;

mod engine_tests;
mod utils;

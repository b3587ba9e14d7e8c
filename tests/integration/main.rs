mod api_tests;
mod common;
mod lifecycle;
mod repository;

// tests/property/main.rs

mod dag;

// HealthStats Data
// This crate stores examination records and the monthly statistics rollups

// Database connection management
pub mod database;

// Repository implementations for data access
pub mod repository;

// Data storage models
pub mod models;

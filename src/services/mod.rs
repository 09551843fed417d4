// src/services/mod.rs
pub mod analyzer;
pub mod image_processor;
pub mod llm_service;
pub mod normalizer;
pub mod prompt;
pub mod response_parser;
pub mod simulator;
pub mod validator;

pub use analyzer::FloodAnalyzer;
pub use image_processor::ImageProcessor;
pub use llm_service::{LLMService, VisionModel};

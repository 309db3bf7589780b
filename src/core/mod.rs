// src/core/mod.rs

pub mod binary;
pub mod builder;
pub mod cache;
pub mod codec;
pub mod context;
pub mod merge;
pub mod paths;
pub mod resolver;
pub mod settings;
pub mod text;
pub mod tokenizer;

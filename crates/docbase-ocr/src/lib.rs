//! docbase-ocr: remote vision OCR over images and scanned PDFs.

pub mod client;
pub mod service;

pub use client::{OcrClient, RemoteOcr};
pub use service::{estimate_confidence, OcrService};

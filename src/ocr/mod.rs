pub mod tesseract;

pub use tesseract::TesseractEngine;

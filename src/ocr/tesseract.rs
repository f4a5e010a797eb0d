//! Tesseract OCR through `leptess`
//!
//! Each region is grayscaled, upscaled, encoded as PNG and read in
//! single-line mode on the blocking pool. A `LepTess` handle never leaves the
//! thread that created it; every blocking thread keeps its own.

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use leptess::{LepTess, Variable};
use std::cell::RefCell;
use std::fmt::Display;
use std::io::Cursor;
use tracing::debug;

use crate::error::{BotError, Result};
use crate::pog::OcrEngine;

/// Page segmentation mode 7: treat the image as a single text line
const SINGLE_LINE_PSM: &str = "7";

/// Small crops read better when enlarged
const UPSCALE: u32 = 2;

thread_local! {
    static ENGINE: RefCell<Option<(EngineKey, LepTess)>> = RefCell::new(None);
}

/// What a `LepTess` handle was initialised with
#[derive(Debug, Clone, PartialEq, Eq)]
struct EngineKey {
    tessdata_path: Option<String>,
    lang: String,
}

pub struct TesseractEngine {
    key: EngineKey,
}

impl TesseractEngine {
    pub fn new(tessdata_path: Option<String>, lang: impl Into<String>) -> Self {
        Self {
            key: EngineKey {
                tessdata_path,
                lang: lang.into(),
            },
        }
    }

    /// Load the language data once so a broken install shows up at startup
    pub async fn check(&self) -> Result<()> {
        let key = self.key.clone();
        tokio::task::spawn_blocking(move || with_engine(&key, |_| Ok(())))
            .await
            .map_err(|e| ocr_error("OCR task failed", e))?
    }

    pub fn lang(&self) -> &str {
        &self.key.lang
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn read_text(&self, region: &DynamicImage) -> Result<Vec<String>> {
        let region = region.clone();
        let key = self.key.clone();

        let text = tokio::task::spawn_blocking(move || {
            let png = encode_region(&region)?;
            with_engine(&key, |tess| recognize(tess, &png))
        })
        .await
        .map_err(|e| ocr_error("OCR task failed", e))??;

        let tokens = parse_tokens(&text);
        if !tokens.is_empty() {
            debug!("[ocr] {}", tokens.join(" "));
        }
        Ok(tokens)
    }
}

/// Run `f` on this thread's engine, (re)creating it if the key changed
fn with_engine<T>(key: &EngineKey, f: impl FnOnce(&mut LepTess) -> Result<T>) -> Result<T> {
    ENGINE.with(|slot| {
        let mut slot = slot.borrow_mut();
        let mut tess = match slot.take() {
            Some((cached, tess)) if &cached == key => tess,
            _ => create_engine(key)?,
        };
        let result = f(&mut tess);
        *slot = Some((key.clone(), tess));
        result
    })
}

fn create_engine(key: &EngineKey) -> Result<LepTess> {
    let mut tess = LepTess::new(key.tessdata_path.as_deref(), &key.lang)
        .map_err(|e| ocr_error(&format!("cannot load language '{}'", key.lang), e))?;
    tess.set_variable(Variable::TesseditPagesegMode, SINGLE_LINE_PSM)
        .map_err(|e| ocr_error("cannot set page segmentation mode", e))?;
    debug!("Initialised Tesseract ({}) on {:?}", key.lang, std::thread::current().id());
    Ok(tess)
}

fn recognize(tess: &mut LepTess, png: &[u8]) -> Result<String> {
    tess.set_image_from_mem(png)
        .map_err(|e| ocr_error("cannot load region", e))?;
    tess.get_utf8_text()
        .map_err(|e| ocr_error("cannot read text", e))
}

fn ocr_error(context: &str, err: impl Display) -> BotError {
    BotError::Ocr {
        message: format!("{}: {}", context, err),
    }
}

/// Grayscale, enlarge and PNG-encode a region
fn encode_region(region: &DynamicImage) -> Result<Vec<u8>> {
    let prepared = region.grayscale().resize_exact(
        region.width() * UPSCALE,
        region.height() * UPSCALE,
        FilterType::Triangle,
    );

    let mut png = Vec::new();
    prepared
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| ocr_error("failed to encode region", e))?;
    Ok(png)
}

/// One token per non-empty output line
fn parse_tokens(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

use async_trait::async_trait;
use image::DynamicImage;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{BotError, Result};

/// Cards in a standard drop image
pub const DEFAULT_SLOT_COUNT: usize = 3;

/// Black-box text recognition over an image region
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognized text tokens, in reading order
    async fn read_text(&self, region: &DynamicImage) -> Result<Vec<String>>;
}

/// Pixel rectangle inside an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Intersect with an image of the given size, `None` if nothing is left
    pub fn clamp_to(&self, image_width: u32, image_height: u32) -> Option<Region> {
        if self.x >= image_width || self.y >= image_height {
            return None;
        }
        let width = self.width.min(image_width - self.x);
        let height = self.height.min(image_height - self.y);
        if width == 0 || height == 0 {
            return None;
        }
        Some(Region {
            x: self.x,
            y: self.y,
            width,
            height,
        })
    }
}

/// Field box position relative to a card's column origin
#[derive(Debug, Clone, Copy)]
pub struct FieldBox {
    pub x_offset: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FieldBox {
    fn at_column(&self, column_x: u32) -> Region {
        Region {
            x: column_x + self.x_offset,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

/// The three text regions of one card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRegions {
    pub name: Region,
    pub series: Region,
    pub generation: Region,
}

/// Fixed pixel layout of a multi-card drop image
#[derive(Debug, Clone)]
pub struct CardLayout {
    pub columns: Vec<u32>,
    pub name: FieldBox,
    pub series: FieldBox,
    pub generation: FieldBox,
}

impl Default for CardLayout {
    /// Layout of the 3-up drop image
    fn default() -> Self {
        Self {
            columns: vec![12, 361, 704],
            name: FieldBox {
                x_offset: 0,
                y: 458,
                width: 290,
                height: 26,
            },
            series: FieldBox {
                x_offset: 0,
                y: 487,
                width: 290,
                height: 26,
            },
            generation: FieldBox {
                x_offset: 24,
                y: 427,
                width: 108,
                height: 26,
            },
        }
    }
}

impl CardLayout {
    /// Regions for a zero-based slot
    pub fn slot(&self, index: usize) -> Option<SlotRegions> {
        let column_x = *self.columns.get(index)?;
        Some(SlotRegions {
            name: self.name.at_column(column_x),
            series: self.series.at_column(column_x),
            generation: self.generation.at_column(column_x),
        })
    }
}

/// Text read from one card of the image
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractedField {
    /// 1-based card position
    pub card_slot: u8,
    pub name: String,
    pub series: String,
    pub generation: String,
}

/// Crops fixed regions out of a drop image and runs OCR on each
pub struct FieldExtractor {
    ocr: Arc<dyn OcrEngine>,
    layout: CardLayout,
    ocr_timeout: Duration,
}

impl FieldExtractor {
    pub fn new(ocr: Arc<dyn OcrEngine>, layout: CardLayout, ocr_timeout: Duration) -> Self {
        Self {
            ocr,
            layout,
            ocr_timeout,
        }
    }

    /// Extract name, series and generation for up to `slot_count` cards
    pub async fn extract(
        &self,
        image: &DynamicImage,
        slot_count: usize,
    ) -> Result<Vec<ExtractedField>> {
        let mut fields = Vec::with_capacity(slot_count);

        for index in 0..slot_count.min(self.layout.columns.len()) {
            let Some(regions) = self.layout.slot(index) else {
                break;
            };

            let field = ExtractedField {
                card_slot: (index + 1) as u8,
                name: self.read_region(image, regions.name).await?,
                series: self.read_region(image, regions.series).await?,
                generation: self.read_region(image, regions.generation).await?,
            };
            debug!("Extracted card {}: {:?}", field.card_slot, field);
            fields.push(field);
        }

        Ok(fields)
    }

    async fn read_region(&self, image: &DynamicImage, region: Region) -> Result<String> {
        let Some(region) = region.clamp_to(image.width(), image.height()) else {
            return Ok(String::new());
        };

        let crop = image.crop_imm(region.x, region.y, region.width, region.height);
        let tokens = tokio::time::timeout(self.ocr_timeout, self.ocr.read_text(&crop))
            .await
            .map_err(|_| BotError::Ocr {
                message: format!("timed out after {:?} on {:?}", self.ocr_timeout, region),
            })??;

        Ok(tokens.join(" ").trim().to_string())
    }
}

/// Decode raw image bytes off the async executor
pub async fn decode_image(bytes: Vec<u8>) -> Result<DynamicImage> {
    tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .map_err(|e| BotError::Internal {
            message: format!("image decode task failed: {}", e),
        })?
        .map_err(|e| BotError::ImageDecode {
            message: e.to_string(),
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::RgbaImage;
    use parking_lot::Mutex;

    /// Replies with one canned text per call and records crop sizes
    #[derive(Default)]
    pub(crate) struct ScriptedOcr {
        pub replies: Mutex<Vec<Vec<String>>>,
        pub seen: Mutex<Vec<(u32, u32)>>,
    }

    impl ScriptedOcr {
        pub fn replying(replies: &[&[&str]]) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .iter()
                        .rev()
                        .map(|tokens| tokens.iter().map(|t| t.to_string()).collect())
                        .collect(),
                ),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl OcrEngine for ScriptedOcr {
        async fn read_text(&self, region: &DynamicImage) -> Result<Vec<String>> {
            self.seen.lock().push((region.width(), region.height()));
            Ok(self.replies.lock().pop().unwrap_or_default())
        }
    }

    struct FailingOcr;

    #[async_trait]
    impl OcrEngine for FailingOcr {
        async fn read_text(&self, _region: &DynamicImage) -> Result<Vec<String>> {
            Err(BotError::Ocr {
                message: "engine unavailable".to_string(),
            })
        }
    }

    struct StalledOcr;

    #[async_trait]
    impl OcrEngine for StalledOcr {
        async fn read_text(&self, _region: &DynamicImage) -> Result<Vec<String>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec![])
        }
    }

    pub(crate) fn drop_image() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::new(1010, 520))
    }

    fn extractor(ocr: Arc<dyn OcrEngine>) -> FieldExtractor {
        FieldExtractor::new(ocr, CardLayout::default(), Duration::from_secs(5))
    }

    #[test]
    fn test_layout_regions() {
        let layout = CardLayout::default();
        let second = layout.slot(1).unwrap();
        assert_eq!(
            second.name,
            Region {
                x: 361,
                y: 458,
                width: 290,
                height: 26
            }
        );
        assert_eq!(second.series.y, 487);
        assert_eq!(
            second.generation,
            Region {
                x: 385,
                y: 427,
                width: 108,
                height: 26
            }
        );
        assert_eq!(layout.slot(2).unwrap().generation.x, 728);
        assert!(layout.slot(3).is_none());
    }

    #[test]
    fn test_region_clamping() {
        let region = Region {
            x: 704,
            y: 487,
            width: 290,
            height: 26,
        };
        assert_eq!(region.clamp_to(800, 500).unwrap().width, 96);
        assert_eq!(region.clamp_to(800, 500).unwrap().height, 13);
        assert!(region.clamp_to(700, 600).is_none());
        assert!(region.clamp_to(1000, 487).is_none());
    }

    #[tokio::test]
    async fn test_extracts_in_slot_order() {
        let ocr = Arc::new(ScriptedOcr::replying(&[
            &["Raiden", "Shogun"],
            &["Genshin", "Impact "],
            &["42"],
            &["Nahida"],
            &[],
            &["1204"],
            &["  Zhongli  "],
            &["Genshin Impact"],
            &["88"],
        ]));

        let fields = extractor(ocr.clone())
            .extract(&drop_image(), DEFAULT_SLOT_COUNT)
            .await
            .unwrap();

        assert_eq!(fields.len(), 3);
        assert_eq!(
            fields[0],
            ExtractedField {
                card_slot: 1,
                name: "Raiden Shogun".to_string(),
                series: "Genshin Impact".to_string(),
                generation: "42".to_string(),
            }
        );
        assert_eq!(fields[1].series, "");
        assert_eq!(fields[2].card_slot, 3);
        assert_eq!(fields[2].name, "Zhongli");

        let seen = ocr.seen.lock().clone();
        assert_eq!(seen.len(), 9);
        assert_eq!(seen[0], (290, 26));
        assert_eq!(seen[2], (108, 26));
    }

    #[tokio::test]
    async fn test_slot_count_is_capped_by_layout() {
        let ocr = Arc::new(ScriptedOcr::default());
        let fields = extractor(ocr).extract(&drop_image(), 5).await.unwrap();
        assert_eq!(fields.len(), 3);
    }

    #[tokio::test]
    async fn test_small_image_yields_empty_fields_without_ocr() {
        let ocr = Arc::new(ScriptedOcr::default());
        let small = DynamicImage::ImageRgba8(RgbaImage::new(300, 200));

        let fields = extractor(ocr.clone()).extract(&small, 2).await.unwrap();

        assert_eq!(fields.len(), 2);
        assert!(fields.iter().all(|f| f.name.is_empty() && f.generation.is_empty()));
        assert!(ocr.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_ocr_failure_propagates() {
        let result = extractor(Arc::new(FailingOcr))
            .extract(&drop_image(), DEFAULT_SLOT_COUNT)
            .await;
        assert!(matches!(result, Err(BotError::Ocr { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ocr_timeout() {
        let result = extractor(Arc::new(StalledOcr))
            .extract(&drop_image(), 1)
            .await;
        assert!(matches!(result, Err(BotError::Ocr { .. })));
    }

    #[tokio::test]
    async fn test_decode_rejects_garbage() {
        let result = decode_image(b"definitely not a png".to_vec()).await;
        assert!(matches!(result, Err(BotError::ImageDecode { .. })));
    }
}

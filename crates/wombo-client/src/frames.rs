//! Preview frame aggregation
//!
//! Frames are fetched concurrently and complete in any order. Each result
//! carries its input index and lands in that slot, so the animation always
//! follows the order of the URL list.

use futures::stream::{FuturesUnordered, StreamExt};
use gif::{Encoder, Frame as GifFrame, Repeat};
use image::imageops::FilterType;
use image::RgbaImage;
use std::time::Duration;
use tracing::{debug, info, instrument};
use wombo_core::{DreamConfig, DreamError, Result};

use crate::transport::{HttpRequest, Transport};

/// Quantizer speed for `Frame::from_rgba_speed` (1 = best, 30 = fastest)
const QUANTIZE_SPEED: i32 = 10;

/// One decoded preview image
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position in the requested URL list
    pub index: usize,
    pub source_url: String,
    pub image: RgbaImage,
}

/// Decode raw image bytes (PNG, JPEG, GIF or WebP)
pub fn decode_frame(index: usize, source_url: &str, bytes: &[u8]) -> Result<Frame> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| DreamError::Decode(format!("frame {} ({}): {}", index, source_url, e)))?
        .to_rgba8();
    Ok(Frame {
        index,
        source_url: source_url.to_string(),
        image,
    })
}

/// Encode frames, in slice order, as an infinitely looping GIF
///
/// Every frame is scaled to the first frame's dimensions.
pub fn encode_animation(frames: &[Frame], delay: Duration) -> Result<Vec<u8>> {
    let first = frames
        .first()
        .ok_or_else(|| DreamError::Decode("no frames to encode".to_string()))?;

    let (width, height) = first.image.dimensions();
    let gif_width = u16::try_from(width)
        .map_err(|_| DreamError::Decode(format!("frame width {} exceeds GIF limit", width)))?;
    let gif_height = u16::try_from(height)
        .map_err(|_| DreamError::Decode(format!("frame height {} exceeds GIF limit", height)))?;

    // GIF delays are in centiseconds
    let delay_cs = u16::try_from(delay.as_millis() / 10).unwrap_or(u16::MAX);

    let mut output = Vec::new();
    {
        let mut encoder = Encoder::new(&mut output, gif_width, gif_height, &[])
            .map_err(|e| DreamError::Decode(format!("Failed to create GIF encoder: {}", e)))?;
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| DreamError::Decode(format!("Failed to set GIF repeat: {}", e)))?;

        for frame in frames {
            let mut rgba = if frame.image.dimensions() == (width, height) {
                frame.image.as_raw().clone()
            } else {
                image::imageops::resize(&frame.image, width, height, FilterType::Triangle)
                    .into_raw()
            };

            let mut gif_frame =
                GifFrame::from_rgba_speed(gif_width, gif_height, &mut rgba, QUANTIZE_SPEED);
            gif_frame.delay = delay_cs;

            encoder.write_frame(&gif_frame).map_err(|e| {
                DreamError::Decode(format!("Failed to write GIF frame {}: {}", frame.index, e))
            })?;
        }
    }

    Ok(output)
}

/// Fetches preview frames and assembles them into an animation
#[derive(Debug, Clone)]
pub struct FrameAggregator<T: Transport> {
    transport: T,
    timeout: Duration,
    frame_delay: Duration,
}

impl<T: Transport> FrameAggregator<T> {
    pub fn new(transport: T, config: &DreamConfig) -> Self {
        Self {
            transport,
            timeout: config.timeouts.frame(),
            frame_delay: Duration::from_millis(config.animation.frame_delay_ms),
        }
    }

    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = delay;
        self
    }

    async fn fetch_one(&self, index: usize, url: &str) -> Result<Frame> {
        let response = self
            .transport
            .execute(HttpRequest::get(url).timeout(self.timeout))
            .await
            .map_err(|e| DreamError::Fetch(format!("frame {} ({}): {}", index, url, e)))?;

        if !response.is_success() {
            return Err(DreamError::Fetch(format!(
                "frame {} ({}) returned {}",
                index, url, response.status
            )));
        }

        decode_frame(index, url, &response.body)
    }

    /// Fetch and decode every URL concurrently, returned in input order
    ///
    /// The first failure aborts the remaining fetches.
    pub async fn fetch_frames(&self, urls: &[String]) -> Result<Vec<Frame>> {
        let mut pending: FuturesUnordered<_> = urls
            .iter()
            .enumerate()
            .map(|(index, url)| async move { (index, self.fetch_one(index, url).await) })
            .collect();

        let mut slots: Vec<Option<Frame>> = vec![None; urls.len()];
        while let Some((index, result)) = pending.next().await {
            debug!("Frame {} arrived", index);
            slots[index] = Some(result?);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| DreamError::Fetch(format!("frame {} missing", index)))
            })
            .collect()
    }

    /// Fetch `urls` and encode them, in order, as a looping GIF
    #[instrument(skip(self, urls), fields(frames = urls.len()))]
    pub async fn assemble_animation(&self, urls: &[String]) -> Result<Vec<u8>> {
        if urls.is_empty() {
            return Err(DreamError::Decode("no frame URLs to assemble".to_string()));
        }

        let frames = self.fetch_frames(urls).await?;
        let delay = self.frame_delay;
        let gif = tokio::task::spawn_blocking(move || encode_animation(&frames, delay))
            .await
            .map_err(|e| DreamError::Decode(format!("GIF encoder task failed: {}", e)))??;

        info!("Assembled {} frames into {} byte GIF", urls.len(), gif.len());
        Ok(gif)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{HttpResponse, Method, MockTransport};
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn png(color: [u8; 3], width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([color[0], color[1], color[2], 255]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    /// Dominant channel (0 = red, 1 = green, 2 = blue) of each decoded frame
    fn decoded_channels(gif_bytes: &[u8]) -> Vec<usize> {
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::RGBA);
        let mut decoder = options.read_info(Cursor::new(gif_bytes)).unwrap();

        let mut channels = Vec::new();
        while let Some(frame) = decoder.read_next_frame().unwrap() {
            let pixel = &frame.buffer[..3];
            let dominant = (0..3).max_by_key(|&c| pixel[c]).unwrap();
            channels.push(dominant);
        }
        channels
    }

    fn urls(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| format!("https://cdn.test/{}.png", n)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_keep_input_order() {
        let list = urls(&["u1", "u2", "u3"]);
        let mock = MockTransport::new()
            .with_delayed_response(
                Method::Get,
                &list[0],
                Duration::from_millis(200),
                HttpResponse::ok(png([255, 0, 0], 4, 4)),
            )
            .with_delayed_response(
                Method::Get,
                &list[1],
                Duration::from_millis(300),
                HttpResponse::ok(png([0, 255, 0], 4, 4)),
            )
            .with_delayed_response(
                Method::Get,
                &list[2],
                Duration::from_millis(100),
                HttpResponse::ok(png([0, 0, 255], 4, 4)),
            );

        let aggregator = FrameAggregator::new(mock.clone(), &DreamConfig::default());
        let gif = aggregator.assemble_animation(&list).await.unwrap();

        assert_eq!(
            mock.completion_order(),
            vec![list[2].clone(), list[0].clone(), list[1].clone()]
        );
        assert_eq!(decoded_channels(&gif), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_fetch_frames_indexes() {
        let list = urls(&["a", "b"]);
        let mock = MockTransport::new()
            .with_response(Method::Get, &list[0], HttpResponse::ok(png([255, 0, 0], 2, 2)))
            .with_response(Method::Get, &list[1], HttpResponse::ok(png([0, 255, 0], 2, 2)));

        let frames = FrameAggregator::new(mock, &DreamConfig::default())
            .fetch_frames(&list)
            .await
            .unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].index, 0);
        assert_eq!(frames[1].source_url, list[1]);
    }

    #[tokio::test]
    async fn test_gif_loops_with_configured_delay() {
        let list = urls(&["a", "b"]);
        let mock = MockTransport::new()
            .with_response(Method::Get, &list[0], HttpResponse::ok(png([255, 0, 0], 2, 2)))
            .with_response(Method::Get, &list[1], HttpResponse::ok(png([0, 0, 255], 2, 2)));

        let gif = FrameAggregator::new(mock, &DreamConfig::default())
            .with_frame_delay(Duration::from_millis(250))
            .assemble_animation(&list)
            .await
            .unwrap();

        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::RGBA);
        let mut decoder = options.read_info(Cursor::new(&gif)).unwrap();
        let frame = decoder.read_next_frame().unwrap().unwrap();
        assert_eq!(frame.delay, 25);
        // NETSCAPE2.0 application extension marks the loop
        assert!(gif.windows(11).any(|w| w == b"NETSCAPE2.0"));
    }

    #[tokio::test]
    async fn test_mismatched_sizes_scaled_to_first() {
        let list = urls(&["big", "small"]);
        let mock = MockTransport::new()
            .with_response(Method::Get, &list[0], HttpResponse::ok(png([255, 0, 0], 8, 6)))
            .with_response(Method::Get, &list[1], HttpResponse::ok(png([0, 255, 0], 2, 2)));

        let gif = FrameAggregator::new(mock, &DreamConfig::default())
            .assemble_animation(&list)
            .await
            .unwrap();

        let decoder = gif::DecodeOptions::new().read_info(Cursor::new(&gif)).unwrap();
        assert_eq!((decoder.width(), decoder.height()), (8, 6));
    }

    #[tokio::test]
    async fn test_unreachable_frame_is_fetch_error() {
        let list = urls(&["a", "b"]);
        let mock = MockTransport::new()
            .with_response(Method::Get, &list[0], HttpResponse::ok(png([255, 0, 0], 2, 2)))
            .with_network_error(Method::Get, &list[1], "connection reset");

        let err = FrameAggregator::new(mock, &DreamConfig::default())
            .assemble_animation(&list)
            .await
            .unwrap_err();
        assert!(matches!(err, DreamError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_error_status_is_fetch_error() {
        let list = urls(&["a"]);
        let mock = MockTransport::new().with_response(
            Method::Get,
            &list[0],
            HttpResponse::new(403, "forbidden"),
        );
        let err = FrameAggregator::new(mock, &DreamConfig::default())
            .assemble_animation(&list)
            .await
            .unwrap_err();
        assert!(matches!(err, DreamError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_invalid_image_is_decode_error() {
        let list = urls(&["a"]);
        let mock = MockTransport::new().with_text(Method::Get, &list[0], "<html>not an image</html>");
        let err = FrameAggregator::new(mock, &DreamConfig::default())
            .assemble_animation(&list)
            .await
            .unwrap_err();
        assert!(matches!(err, DreamError::Decode(_)));
    }

    #[tokio::test]
    async fn test_empty_url_list() {
        let mock = MockTransport::new();
        let err = FrameAggregator::new(mock.clone(), &DreamConfig::default())
            .assemble_animation(&[])
            .await
            .unwrap_err();
        assert!(matches!(err, DreamError::Decode(_)));
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn test_encode_without_frames() {
        let err = encode_animation(&[], Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, DreamError::Decode(_)));
    }
}

//! Result delivery from the OCR worker to the consumer
//!
//! One unbounded channel carries both crop previews and recognized text so
//! the consumer sees them in the order frames were processed. Posting never
//! blocks the worker.

use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use image::RgbImage;
use tracing::debug;

use crate::vision::OcrResult;

/// Messages sent from the worker to the consumer
#[derive(Debug, Clone)]
pub enum OcrEvent {
    /// Rotated crop that was fed to the engine
    CropPreview(RgbImage),
    /// Normalized text for the same crop
    TextRecognized(OcrResult),
}

/// Consumer callback for recognized text
pub trait OcrListener {
    fn on_text_recognized(&mut self, text: &str, confidence: f32);
}

/// Consumer callback for crop previews
pub trait CropListener {
    fn on_crop_preview(&mut self, image: &RgbImage);
}

/// Worker-side sender
#[derive(Debug, Clone)]
pub struct ResultDispatcher {
    tx: Sender<OcrEvent>,
}

impl ResultDispatcher {
    /// Create a connected dispatcher/receiver pair
    pub fn channel() -> (ResultDispatcher, ResultReceiver) {
        let (tx, rx) = unbounded();
        (ResultDispatcher { tx }, ResultReceiver { rx })
    }

    pub fn post_preview(&self, image: RgbImage) {
        self.post(OcrEvent::CropPreview(image));
    }

    pub fn post_text(&self, text: String, confidence: f32) {
        self.post(OcrEvent::TextRecognized(OcrResult { text, confidence }));
    }

    fn post(&self, event: OcrEvent) {
        if self.tx.send(event).is_err() {
            debug!("Result receiver dropped, discarding OCR event");
        }
    }
}

/// Consumer-side end of the result channel
#[derive(Debug, Clone)]
pub struct ResultReceiver {
    rx: Receiver<OcrEvent>,
}

impl ResultReceiver {
    /// Next event if one is waiting
    pub fn try_next(&self) -> Option<OcrEvent> {
        self.rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event
    pub fn next_timeout(&self, timeout: Duration) -> Option<OcrEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Number of undelivered events
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Hand every waiting event to the listeners, in order.
    ///
    /// Events without a matching listener are dropped. Returns the number of
    /// events taken off the channel.
    pub fn deliver(
        &self,
        mut ocr: Option<&mut (dyn OcrListener + Send)>,
        mut crop: Option<&mut (dyn CropListener + Send)>,
    ) -> usize {
        let mut delivered = 0;
        for event in self.rx.try_iter() {
            delivered += 1;
            match event {
                OcrEvent::CropPreview(image) => {
                    if let Some(listener) = crop.as_deref_mut() {
                        listener.on_crop_preview(&image);
                    }
                }
                OcrEvent::TextRecognized(result) => {
                    if let Some(listener) = ocr.as_deref_mut() {
                        listener.on_text_recognized(&result.text, result.confidence);
                    }
                }
            }
        }
        delivered
    }

    /// Underlying channel for consumers that select over several sources
    pub fn receiver(&self) -> &Receiver<OcrEvent> {
        &self.rx
    }
}

// Deterministic stand-ins for the embedding and generation backends

use itertools::Itertools;
use std::fmt::Write as _;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::embeddings::Embedder;
use crate::generation::{GenerationError, LanguageModel};
use crate::{QaError, Result};

pub(crate) const FAKE_DIMENSION: usize = 64;

/// Bag-of-words embedder: each lowercase word bumps one hashed bucket
///
/// Texts sharing words end up close together, which is enough to make
/// nearest-neighbour results predictable in tests.
pub(crate) struct FakeEmbedder {
    model: String,
    dimension: usize,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeEmbedder {
    pub(crate) fn new() -> Self {
        Self::with_dimension(FAKE_DIMENSION)
    }

    pub(crate) fn with_dimension(dimension: usize) -> Self {
        Self {
            model: "fake-embedder".to_string(),
            dimension,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        for word in text.split(|c: char| !c.is_alphanumeric()) {
            if word.is_empty() {
                continue;
            }
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
                    (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
                });
            vector[(hash % self.dimension as u64) as usize] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl Embedder for FakeEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(QaError::Embedding("embedding backend unavailable".to_string()));
        }
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(QaError::Embedding("embedding backend unavailable".to_string()));
        }
        Ok(self.vectorize(text))
    }
}

/// Language model that records every prompt and replies with a canned result
pub(crate) struct FakeLanguageModel {
    reply: std::result::Result<String, (u16, String)>,
    prompts: Mutex<Vec<String>>,
}

impl FakeLanguageModel {
    pub(crate) fn answering(answer: &str) -> Self {
        Self {
            reply: Ok(answer.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(status: u16, body: &str) -> Self {
        Self {
            reply: Err((status, body.to_string())),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl LanguageModel for FakeLanguageModel {
    fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        match &self.reply {
            Ok(answer) => Ok(answer.clone()),
            Err((status, body)) => Err(GenerationError::Status {
                status: *status,
                body: body.clone(),
            }),
        }
    }
}

/// A minimal PDF with one Helvetica text line per page
pub(crate) fn sample_pdf(pages: &[&str]) -> Vec<u8> {
    let font_id = 3;
    let first_page_id = 4;
    let page_ids: Vec<usize> = (0..pages.len()).map(|i| first_page_id + 2 * i).collect();

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            page_ids.iter().map(|id| format!("{id} 0 R")).join(" "),
            pages.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];

    for (text, page_id) in pages.iter().zip(&page_ids) {
        let escaped = text
            .replace('\\', "\\\\")
            .replace('(', "\\(")
            .replace(')', "\\)");
        let content = format!("BT /F1 12 Tf 72 720 Td ({escaped}) Tj ET");
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 {font_id} 0 R >> >> /Contents {} 0 R >>",
            page_id + 1
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{content}\nendstream",
            content.len()
        ));
    }

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        write!(pdf, "{} 0 obj\n{body}\nendobj\n", i + 1).expect("writing to a String");
    }

    let xref_offset = pdf.len();
    write!(pdf, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1)
        .expect("writing to a String");
    for offset in offsets {
        write!(pdf, "{offset:010} 00000 n \n").expect("writing to a String");
    }
    write!(
        pdf,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
        objects.len() + 1
    )
    .expect("writing to a String");

    pdf.into_bytes()
}

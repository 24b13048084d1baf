//! Catalogue of the container formats the decoding library was built with.
//!
//! Read from the format readers' own descriptors, so the list follows the enabled
//! Symphonia features instead of a hand-kept table.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;
use symphonia::core::probe::{Descriptor, QueryDescriptor};
use symphonia::default::formats::{
    AdtsReader, AiffReader, FlacReader, IsoMp4Reader, MpaReader, OggReader, WavReader,
};

pub const DECODER_LIBRARY: &str = "Symphonia";
/// Minimum version required by the workspace manifest.
///
/// Symphonia has no runtime version query, and Cargo may resolve any newer 0.5.x
/// release, so this is a lower bound rather than the exact build.
pub const DECODER_LIBRARY_VERSION: &str = "0.5.5";
const DECODER_AUTHOR: &str = "The Project Symphonia Developers";
const DECODER_URL: &str = "https://github.com/pdeljanov/Symphonia";

/// One registered format reader.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DecoderInfo {
    pub name: String,
    pub description: String,
    pub extensions: Vec<String>,
    pub mime_types: Vec<String>,
    pub author: String,
    pub url: String,
}

impl DecoderInfo {
    fn from_descriptor(desc: &Descriptor) -> Self {
        Self {
            name: desc.short_name.to_string(),
            description: desc.long_name.to_string(),
            extensions: desc.extensions.iter().map(|e| e.to_string()).collect(),
            mime_types: desc.mime_types.iter().map(|m| m.to_string()).collect(),
            author: DECODER_AUTHOR.to_string(),
            url: DECODER_URL.to_string(),
        }
    }
}

/// Decoding library version plus every format it can open.
#[derive(Clone, Debug, Serialize)]
pub struct DecoderCatalog {
    pub library: String,
    pub version: String,
    pub decoders: Vec<DecoderInfo>,
}

impl DecoderCatalog {
    /// Collect descriptors from the format readers compiled into this build.
    pub fn discover() -> Self {
        let descriptors = [
            FlacReader::query(),
            MpaReader::query(),
            AdtsReader::query(),
            IsoMp4Reader::query(),
            OggReader::query(),
            WavReader::query(),
            AiffReader::query(),
        ];
        Self::from_descriptors(descriptors.into_iter().flatten())
    }

    fn from_descriptors<'a>(descriptors: impl IntoIterator<Item = &'a Descriptor>) -> Self {
        Self {
            library: DECODER_LIBRARY.to_string(),
            version: DECODER_LIBRARY_VERSION.to_string(),
            decoders: descriptors.into_iter().map(DecoderInfo::from_descriptor).collect(),
        }
    }

    /// Lowercase, de-duplicated file extensions across all decoders.
    pub fn supported_extensions(&self) -> Vec<String> {
        self.decoders
            .iter()
            .flat_map(|d| d.extensions.iter().map(|e| e.to_ascii_lowercase()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Whether `path`'s extension is one a decoder claims. Probing may still accept
    /// files this rejects.
    pub fn supports(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.decoders
            .iter()
            .any(|d| d.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// Plain-text summary: version header, then one block per decoder.
    pub fn render(&self) -> String {
        let mut out = format!(
            "Version: {} {} or newer\nSupported formats:\n\n",
            self.library, self.version
        );
        if self.decoders.is_empty() {
            out.push_str("Empty");
            return out;
        }
        let blocks: Vec<String> = self
            .decoders
            .iter()
            .map(|d| {
                let mut lines = Vec::new();
                if !d.extensions.is_empty() {
                    lines.push(d.extensions.join(", "));
                }
                lines.push(d.description.clone());
                lines.push(d.author.clone());
                lines.push(d.url.clone());
                lines.join("\n")
            })
            .collect();
        out.push_str(&blocks.join("\n\n"));
        out
    }
}

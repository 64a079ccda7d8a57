//! Named color lists

use crate::context::Context;
use crate::error::{ErrorKind, Result};
use crate::pipeline::MAX_CHANNELS;

/// One entry of a named color list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedColor {
    pub name: String,
    /// PCS value, v4 Lab encoding
    pub pcs: [u16; 3],
    /// Device colorants, `colorant_count` entries
    pub device: Vec<u16>,
}

/// Spot colors addressed by index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedColorList {
    prefix: String,
    suffix: String,
    colorant_count: usize,
    colors: Vec<NamedColor>,
}

impl NamedColorList {
    pub fn new(
        ctx: &Context,
        colorant_count: usize,
        prefix: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Result<Self> {
        if colorant_count == 0 || colorant_count > MAX_CHANNELS {
            return Err(ctx.report(
                ErrorKind::Range,
                format!("Named color list with {colorant_count} colorants (max={MAX_CHANNELS})"),
            ));
        }
        Ok(Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
            colorant_count,
            colors: Vec::new(),
        })
    }

    /// Add a color; missing colorants read as 0, extra ones are dropped
    pub fn append(&mut self, name: impl Into<String>, pcs: [u16; 3], device: &[u16]) {
        let mut colorants = vec![0u16; self.colorant_count];
        for (dst, src) in colorants.iter_mut().zip(device) {
            *dst = *src;
        }
        self.colors.push(NamedColor {
            name: name.into(),
            pcs,
            device: colorants,
        });
    }

    pub fn count(&self) -> usize {
        self.colors.len()
    }

    pub fn colorant_count(&self) -> usize {
        self.colorant_count
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Position of a color by case-insensitive name
    pub fn index(&self, name: &str) -> Option<usize> {
        self.colors
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn info(&self, index: usize) -> Option<&NamedColor> {
        self.colors.get(index)
    }
}

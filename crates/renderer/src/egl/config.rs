use tracing::{debug, trace};

use super::{ContextError, NONE};

/// Value that tells EGL an attribute does not matter.
pub const DONT_CARE: i32 = -1;

/// Upper bound on candidates requested from `eglChooseConfig`.
pub const MAX_CONFIGS: usize = 128;

/// Framebuffer config attributes a request may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    RedSize,
    GreenSize,
    BlueSize,
    AlphaSize,
    DepthSize,
    StencilSize,
    RenderableType,
    SurfaceType,
}

impl Attribute {
    /// EGL enum value.
    pub const fn code(self) -> i32 {
        match self {
            Attribute::AlphaSize => 0x3021,
            Attribute::BlueSize => 0x3022,
            Attribute::GreenSize => 0x3023,
            Attribute::RedSize => 0x3024,
            Attribute::DepthSize => 0x3025,
            Attribute::StencilSize => 0x3026,
            Attribute::SurfaceType => 0x3033,
            Attribute::RenderableType => 0x3040,
        }
    }

    /// Colour and depth sizes take part in the nearest-fit score. Stencil
    /// and the bitmask attributes only constrain the platform's candidate
    /// list.
    pub const fn is_scored(self) -> bool {
        matches!(
            self,
            Attribute::RedSize
                | Attribute::GreenSize
                | Attribute::BlueSize
                | Attribute::AlphaSize
                | Attribute::DepthSize
        )
    }
}

/// Ordered attribute/value pairs passed to `eglChooseConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigRequest {
    entries: Vec<(Attribute, i32)>,
}

impl ConfigRequest {
    /// Empty request; every attribute is left to the platform default.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rgba8888() -> Self {
        Self::new()
            .with(Attribute::RedSize, 8)
            .with(Attribute::GreenSize, 8)
            .with(Attribute::BlueSize, 8)
            .with(Attribute::AlphaSize, 8)
    }

    /// Sets `attribute`, replacing an earlier value in place.
    pub fn with(mut self, attribute: Attribute, value: i32) -> Self {
        match self.entries.iter_mut().find(|(attr, _)| *attr == attribute) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((attribute, value)),
        }
        self
    }

    /// ORs `bits` into the renderable-type mask.
    pub fn with_renderable_type(self, bits: i32) -> Self {
        let current = self
            .get(Attribute::RenderableType)
            .filter(|value| *value != DONT_CARE)
            .unwrap_or(0);
        self.with(Attribute::RenderableType, current | bits)
    }

    /// Requested value for `attribute`, if the request names it.
    pub fn get(&self, attribute: Attribute) -> Option<i32> {
        self.entries
            .iter()
            .find(|(attr, _)| *attr == attribute)
            .map(|(_, value)| *value)
    }

    /// Pairs in insertion order.
    pub fn entries(&self) -> &[(Attribute, i32)] {
        &self.entries
    }

    /// Flattened `attribute, value, ..., NONE` list for `eglChooseConfig`.
    pub fn to_attrib_list(&self) -> Vec<i32> {
        let mut list = Vec::with_capacity(self.entries.len() * 2 + 1);
        for (attribute, value) in &self.entries {
            list.push(attribute.code());
            list.push(*value);
        }
        list.push(NONE);
        list
    }
}

/// Picks the candidate whose size attributes exceed the request by the
/// smallest total margin. The first candidate with the minimum wins and an
/// exact match ends the scan. Candidates whose attributes cannot be read are
/// skipped; if none can be scored the first candidate is used.
pub fn select_config<C, F>(
    candidates: &[C],
    request: &ConfigRequest,
    mut attrib: F,
) -> Result<C, ContextError>
where
    C: Copy,
    F: FnMut(&C, Attribute) -> Option<i32>,
{
    let first = *candidates
        .first()
        .ok_or(ContextError::ConfigurationUnavailable)?;

    let scored: Vec<(Attribute, i32)> = request
        .entries()
        .iter()
        .copied()
        .filter(|(attribute, value)| attribute.is_scored() && *value != DONT_CARE)
        .collect();

    let mut best: Option<(usize, u64)> = None;
    'candidates: for (index, candidate) in candidates.iter().enumerate() {
        let mut diff = 0u64;
        for (attribute, requested) in &scored {
            let Some(actual) = attrib(candidate, *attribute) else {
                trace!(index, ?attribute, "config attribute unreadable; skipping candidate");
                continue 'candidates;
            };
            // Some drivers report sizes below the request.
            diff += u64::from(actual.abs_diff(*requested));
        }
        trace!(index, diff, "scored config candidate");
        if best.map_or(true, |(_, lowest)| diff < lowest) {
            best = Some((index, diff));
        }
        if diff == 0 {
            break;
        }
    }

    match best {
        Some((index, diff)) => {
            debug!(index, diff, candidates = candidates.len(), "selected EGL config");
            Ok(candidates[index])
        }
        None => {
            debug!(candidates = candidates.len(), "no scorable EGL config; using first");
            Ok(first)
        }
    }
}

//! Typesetting engine abstraction and the per-font instance cache.
//!
//! The engine itself is an external collaborator reached through the
//! [`Typesetter`] trait. Building one is expensive (process start, TeX
//! package registration, font metric loading), so [`EngineCache`] keeps at
//! most one [`EngineInstance`] per [`MathFont`] and hands out shared
//! references to it.

mod adaptor;
mod node;

pub use adaptor::{RawBox, SvgAdaptor, SvgTemplate};
pub use node::{NodeEngineFactory, NodeMathJax};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::Result;
use crate::fonts::{FontAssets, FontResolver, MathFont};

/// Layout parameters for one conversion, in the engine's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypesetRequest<'a> {
    /// TeX source, without math delimiters
    pub math: &'a str,
    /// Display (block) instead of inline layout
    pub display: bool,
    /// Em size
    pub em: f64,
    /// Ex size
    pub ex: f64,
    /// Width available for line breaking
    pub container_width: f64,
}

/// A constructed engine bound to one font.
pub trait Typesetter: Send {
    /// Lay out `request.math` and return a bare `<svg>` element whose root
    /// carries ex-valued `width`/`height` and a `vertical-align` style.
    fn typeset(&mut self, request: &TypesetRequest<'_>) -> Result<String>;
}

/// Builds typesetters for resolved fonts.
pub trait EngineFactory: Send + Sync {
    /// Construct a typesetter using `assets`.
    fn build(&self, assets: &FontAssets) -> Result<Box<dyn Typesetter>>;
}

/// A ready-to-use engine for one font.
///
/// Conversions on one instance run one at a time; the typesetter lock is
/// held until the markup has been read into a [`RawBox`].
pub struct EngineInstance {
    font: MathFont,
    typesetter: Mutex<Box<dyn Typesetter>>,
    adaptor: Arc<SvgAdaptor>,
}

impl EngineInstance {
    /// Font this instance was built for.
    pub fn font(&self) -> MathFont {
        self.font
    }

    /// The shared markup reader.
    pub fn adaptor(&self) -> &SvgAdaptor {
        &self.adaptor
    }

    /// Typeset and read the result into a structured box.
    pub fn typeset(&self, request: &TypesetRequest<'_>) -> Result<RawBox> {
        let mut typesetter = self.typesetter.lock();
        let markup = typesetter.typeset(request)?;
        self.adaptor.read(markup)
    }
}

impl std::fmt::Debug for EngineInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineInstance")
            .field("font", &self.font)
            .finish_non_exhaustive()
    }
}

type Slot = Arc<Mutex<Option<Arc<EngineInstance>>>>;

/// Lazily built engine instances, one per font.
///
/// Each font has its own slot. A caller that misses holds the slot's lock
/// while the instance is built, so concurrent first uses of a font wait for
/// that single construction. Other fonts are unaffected. A failed build
/// leaves the slot empty and the next `acquire` tries again.
pub struct EngineCache {
    resolver: Arc<dyn FontResolver>,
    factory: Arc<dyn EngineFactory>,
    slots: Mutex<HashMap<MathFont, Slot>>,
    adaptor: Mutex<Option<Arc<SvgAdaptor>>>,
}

impl EngineCache {
    /// Create an empty cache.
    pub fn new(resolver: Arc<dyn FontResolver>, factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            resolver,
            factory,
            slots: Mutex::new(HashMap::new()),
            adaptor: Mutex::new(None),
        }
    }

    /// Get the instance for `font`, building it on first use.
    pub fn acquire(&self, font: MathFont) -> Result<Arc<EngineInstance>> {
        let slot = self.slots.lock().entry(font).or_default().clone();
        let mut entry = slot.lock();

        if let Some(instance) = entry.as_ref() {
            log::debug!("engine cache hit for {}", font);
            return Ok(instance.clone());
        }

        log::debug!("engine cache miss for {}, building", font);
        let assets = self.resolver.resolve(font)?;
        let typesetter = self.factory.build(&assets)?;
        let instance = Arc::new(EngineInstance {
            font,
            typesetter: Mutex::new(typesetter),
            adaptor: self.adaptor(),
        });
        *entry = Some(instance.clone());
        log::info!("engine ready for font {}", font);

        Ok(instance)
    }

    /// Drop every cached instance and the shared adaptor.
    ///
    /// Slots are emptied in place. A build already running for a font
    /// finishes first and is then discarded, so a font never has two
    /// constructions in flight.
    pub fn reset(&self) {
        let slots: Vec<Slot> = self.slots.lock().values().cloned().collect();
        for slot in slots {
            *slot.lock() = None;
        }
        *self.adaptor.lock() = None;
        log::debug!("engine cache reset");
    }

    /// Discard `instance` if it is still the cached one for its font.
    ///
    /// Used when an instance stops working; the next `acquire` builds a
    /// replacement.
    pub fn evict(&self, instance: &Arc<EngineInstance>) {
        let Some(slot) = self.slots.lock().get(&instance.font).cloned() else {
            return;
        };
        let mut entry = slot.lock();
        if entry.as_ref().is_some_and(|cached| Arc::ptr_eq(cached, instance)) {
            *entry = None;
            log::warn!("discarded engine for font {}", instance.font);
        }
    }

    /// True when an instance for `font` is ready.
    pub fn is_cached(&self, font: MathFont) -> bool {
        let slot = self.slots.lock().get(&font).cloned();
        slot.map_or(false, |s| s.lock().is_some())
    }

    /// Fonts with a ready instance, in [`MathFont::ALL`] order.
    pub fn cached_fonts(&self) -> Vec<MathFont> {
        MathFont::ALL
            .into_iter()
            .filter(|font| self.is_cached(*font))
            .collect()
    }

    fn adaptor(&self) -> Arc<SvgAdaptor> {
        self.adaptor
            .lock()
            .get_or_insert_with(|| Arc::new(SvgAdaptor::new()))
            .clone()
    }
}

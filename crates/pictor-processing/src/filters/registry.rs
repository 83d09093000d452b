use super::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available filters, keyed by name.
///
/// Built once at startup and shared read-only; registration takes `&mut self`.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: HashMap<&'static str, Arc<dyn ImageFilter>>,
}

impl FilterRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in filter; `blind_watermark` has no default text.
    pub fn with_defaults() -> Self {
        Self::with_blind_watermark(BlindWatermarkFilter::default())
    }

    /// Registry with every built-in filter, using `blind` for `blind_watermark`.
    pub fn with_blind_watermark(blind: BlindWatermarkFilter) -> Self {
        let builtins: Vec<Arc<dyn ImageFilter>> = vec![
            Arc::new(BlurFilter),
            Arc::new(GrayscaleFilter),
            Arc::new(BrightnessFilter),
            Arc::new(ContrastFilter),
            Arc::new(SaturationFilter),
            Arc::new(SharpenFilter),
            Arc::new(InvertFilter),
            Arc::new(NoopFilter),
            Arc::new(RgbFilter),
            Arc::new(SepiaFilter),
            Arc::new(EqualizeFilter),
            Arc::new(GammaFilter),
            Arc::new(HueFilter),
            Arc::new(RotateFilter),
            Arc::new(RoundCornerFilter),
            Arc::new(NoiseFilter),
            Arc::new(FlipHFilter),
            Arc::new(FlipVFilter),
            Arc::new(PixelateFilter),
            Arc::new(QualityFilter),
            Arc::new(FormatFilter),
            Arc::new(StripExifFilter),
            Arc::new(StripIccFilter),
            Arc::new(AutoOrientFilter),
            Arc::new(WatermarkFilter),
            Arc::new(blind),
        ];

        let mut registry = Self::new();
        for filter in builtins {
            // Built-in names are distinct
            let _ = registry.register(filter);
        }
        registry
    }

    /// Register a filter. A name can only be registered once.
    pub fn register(&mut self, filter: Arc<dyn ImageFilter>) -> Result<()> {
        let name = filter.name();
        if self.filters.contains_key(name) {
            return Err(anyhow!("Filter '{}' is already registered", name));
        }
        self.filters.insert(name, filter);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ImageFilter>> {
        self.filters.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Registered filter names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.filters.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

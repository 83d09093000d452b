use super::{FilterContext, FilterRegistry};
use image::DynamicImage;
use pictor_core::{AppError, AppResult, FilterSpec};
use std::sync::Arc;

/// Applies a request's filters in order.
#[derive(Clone)]
pub struct FilterPipeline {
    registry: Arc<FilterRegistry>,
}

impl FilterPipeline {
    pub fn new(registry: Arc<FilterRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &FilterRegistry {
        &self.registry
    }

    /// Run `specs` over `img`.
    ///
    /// Unknown names are skipped. The first failing filter aborts the pipeline
    /// with [`AppError::FilterFailed`].
    pub fn apply(
        &self,
        img: DynamicImage,
        specs: &[FilterSpec],
        ctx: &FilterContext,
    ) -> AppResult<DynamicImage> {
        let mut current = img;

        for (index, spec) in specs.iter().enumerate() {
            let Some(filter) = self.registry.get(&spec.name) else {
                tracing::debug!(filter = %spec.name, index = index, "Filter not found, skipping");
                continue;
            };

            current = filter
                .apply(current, &spec.params, ctx)
                .map_err(|source| {
                    tracing::debug!(
                        filter = %spec.name,
                        index = index,
                        error = %source,
                        "Filter apply failed"
                    );
                    AppError::FilterFailed {
                        name: spec.name.clone(),
                        source,
                    }
                })?;
        }

        Ok(current)
    }
}

impl Default for FilterPipeline {
    fn default() -> Self {
        Self::new(Arc::new(FilterRegistry::with_defaults()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    fn image() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 6, Rgba([200, 100, 50, 255])))
    }

    fn spec(name: &str, params: &[&str]) -> FilterSpec {
        FilterSpec::new(name, params.iter().map(|p| p.to_string()).collect())
    }

    #[test]
    fn test_filters_apply_in_order() {
        let pipeline = FilterPipeline::default();
        let out = pipeline
            .apply(
                image(),
                &[spec("invert", &[]), spec("fliph", &[])],
                &FilterContext::new(),
            )
            .unwrap();
        assert_eq!(out.dimensions(), (8, 6));
        assert_eq!(out.to_rgba8().get_pixel(0, 0).0, [55, 155, 205, 255]);
    }

    #[test]
    fn test_unknown_filter_skipped() {
        let pipeline = FilterPipeline::default();
        let out = pipeline
            .apply(image(), &[spec("sparkle", &["9"])], &FilterContext::new())
            .unwrap();
        assert_eq!(out.to_rgba8(), image().to_rgba8());
    }

    #[test]
    fn test_failing_filter_is_named() {
        let pipeline = FilterPipeline::default();
        let err = pipeline
            .apply(image(), &[spec("blur", &["-1"])], &FilterContext::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "filter 'blur' failed");
        assert!(matches!(err, AppError::FilterFailed { .. }));
    }
}

//! Selects the erosion kernel entry point for a given [`ErodeVariant`] and
//! builds the shared dispatch parameters. The actual erosion math lives in
//! `shaders/erode*.wgsl`; this module is the host-side policy that picks
//! among the five named kernels.

use crate::variant::ErodeVariant;

/// Entry-point name for a given erosion variant.
pub fn entry_point(variant: ErodeVariant) -> &'static str {
    match (variant.constant_mask, variant.scratchpad) {
        (false, false) => "erode",
        (true, false) => {
            if variant.mask_in_constant_memory {
                "erode_constant_masked"
            } else {
                "erode_masked"
            }
        }
        (false, true) => "erode_local",
        (true, true) => "erode_masked_local",
    }
}

/// Which of the four source blobs a variant's entry point lives in, so the
/// driver knows which compiled `ShaderModule` to pull the pipeline from.
/// `erode_masked` and `erode_constant_masked` are two entry points exported
/// by the same blob.
pub fn blob_name(variant: ErodeVariant) -> &'static str {
    match (variant.constant_mask, variant.scratchpad) {
        (false, false) => "erode",
        (true, false) => "erode_masked",
        (false, true) => "erode_local",
        (true, true) => "erode_masked_local",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_points_are_distinct_per_variant() {
        let variants = [
            ErodeVariant {
                constant_mask: false,
                scratchpad: false,
                mask_in_constant_memory: false,
            },
            ErodeVariant {
                constant_mask: true,
                scratchpad: false,
                mask_in_constant_memory: false,
            },
            ErodeVariant {
                constant_mask: true,
                scratchpad: false,
                mask_in_constant_memory: true,
            },
            ErodeVariant {
                constant_mask: false,
                scratchpad: true,
                mask_in_constant_memory: false,
            },
            ErodeVariant {
                constant_mask: true,
                scratchpad: true,
                mask_in_constant_memory: false,
            },
        ];
        let names: Vec<_> = variants.iter().map(|&v| entry_point(v)).collect();
        let mut deduped = names.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());
    }
}

//! sigtrace-export: Pure format serializers (sans-IO)
//!
//! Renders traced signatures and planned timelines as SVG previews.

pub mod svg;

pub use svg::{SvgMetadata, analysis_to_svg, build_path_data, timeline_to_svg};

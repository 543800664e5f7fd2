//! SVG preview serializers.
//!
//! Uses the [`svg`] crate for document construction, XML escaping and
//! path data formatting. Every stroke becomes one `<path>` made of `M`
//! and `L` commands; strokes with fewer than two points draw nothing and
//! are skipped.
//!
//! Optional [`SvgMetadata`] embeds `<title>`, `<desc>` and a namespaced
//! `<metadata>` element so exported files can be identified later.
//!
//! These are pure functions with no I/O: they return a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Description, Element, Path, Title};
use svg::node::{Node, Text, Value};

use sigtrace_motion::StrokePath;
use sigtrace_pipeline::{Dimensions, NORMALIZED_MAX, RawPoint, SignatureAnalysis, Stroke};

/// Stroke width, in document units, for strokes without traced thickness.
pub const DEFAULT_STROKE_WIDTH: f64 = 1.5;

/// Namespace of the `<sigtrace:config>` metadata element.
const METADATA_NAMESPACE: &str = "https://sigtrace.dev/ns/1";

/// Metadata to embed in the SVG document.
///
/// All fields are optional. Text values are XML-escaped by the `svg`
/// crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    ///
    /// Typically the source image file stem.
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized trace configuration, emitted inside
    /// `<metadata><sigtrace:config>` for reproducibility.
    pub config_json: Option<&'a str>,
}

/// Build an SVG path `d` attribute from already-projected points.
///
/// Returns an empty string for fewer than two points.
///
/// # Examples
///
/// ```
/// use sigtrace_export::build_path_data;
///
/// let d = build_path_data(&[(10.0, 20.0), (30.0, 40.0)]);
/// assert_eq!(d, "M10,20 L30,40");
/// ```
#[must_use]
pub fn build_path_data(points: &[(f64, f64)]) -> String {
    let [first, rest @ ..] = points else {
        return String::new();
    };
    if rest.is_empty() {
        return String::new();
    }

    let mut data = Data::new().move_to(*first);
    for &p in rest {
        data = data.line_to(p);
    }
    String::from(Value::from(data))
}

/// Pixel size of the preview for an analysis.
///
/// Falls back to a square of [`NORMALIZED_MAX`] units when the analysis
/// carries no usable source size.
fn preview_dimensions(analysis: &SignatureAnalysis) -> Dimensions {
    match analysis.metadata.original_size {
        [width, height] if width > 0 && height > 0 => Dimensions { width, height },
        _ => Dimensions {
            width: u32::from(NORMALIZED_MAX),
            height: u32::from(NORMALIZED_MAX),
        },
    }
}

/// Project a normalized coordinate onto a document axis of `extent` units.
fn project(value: u16, extent: u32) -> f64 {
    f64::from(value) / f64::from(NORMALIZED_MAX) * f64::from(extent)
}

/// Mean traced thickness of `stroke` in document units, if any point
/// carries one.
fn mean_thickness(stroke: &Stroke, width: u32) -> Option<f64> {
    let (sum, count) = stroke
        .points()
        .iter()
        .filter_map(|p: &RawPoint| p.z)
        .fold((0.0, 0_u32), |(sum, count), z| {
            (sum + project(z, width), count + 1)
        });
    (count > 0).then(|| sum / f64::from(count))
}

/// Start a document with the given pixel size and the optional metadata
/// children.
fn document(dimensions: Dimensions, metadata: &SvgMetadata<'_>) -> Document {
    let Dimensions { width, height } = dimensions;
    let mut doc = Document::new()
        .set("width", width)
        .set("height", height)
        .set("viewBox", (0, 0, width, height));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    if let Some(config_json) = metadata.config_json {
        let mut config_el = Element::new("sigtrace:config");
        config_el.assign("xmlns:sigtrace", METADATA_NAMESPACE);
        config_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(config_el);
        doc = doc.add(metadata_el);
    }

    doc
}

/// The svg crate omits the XML declaration, so it is prepended here.
fn finish(doc: &Document) -> String {
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

/// Render a traced analysis as a static SVG preview.
///
/// The document has the source image's pixel size. Strokes are drawn in
/// order, each as a black `<path>` whose width is the stroke's mean
/// traced thickness (or [`DEFAULT_STROKE_WIDTH`]).
#[must_use]
pub fn analysis_to_svg(analysis: &SignatureAnalysis, metadata: &SvgMetadata<'_>) -> String {
    let dimensions = preview_dimensions(analysis);
    let mut doc = document(dimensions, metadata);

    for (index, stroke) in analysis.strokes.iter().enumerate() {
        let projected: Vec<(f64, f64)> = stroke
            .points()
            .iter()
            .map(|p| {
                (
                    project(p.x, dimensions.width),
                    project(p.y, dimensions.height),
                )
            })
            .collect();
        let d = build_path_data(&projected);
        if d.is_empty() {
            continue;
        }

        let width = mean_thickness(stroke, dimensions.width).unwrap_or(DEFAULT_STROKE_WIDTH);
        let path = Path::new()
            .set("id", format!("stroke-{index}"))
            .set("d", d)
            .set("fill", "none")
            .set("stroke", "black")
            .set("stroke-linecap", "round")
            .set("stroke-linejoin", "round")
            .set("stroke-width", format!("{width:.2}"));
        doc = doc.add(path);
    }

    finish(&doc)
}

/// Render a planned timeline as a static SVG on its canvas.
///
/// Each [`StrokePath`] becomes a `<path>` carrying its mean line width
/// and opacity, plus `data-start` and `data-end` attributes holding its
/// timestamps in milliseconds so a viewer can animate it.
#[must_use]
pub fn timeline_to_svg(
    paths: &[StrokePath],
    width: u32,
    height: u32,
    metadata: &SvgMetadata<'_>,
) -> String {
    let mut doc = document(Dimensions { width, height }, metadata);

    for path in paths {
        let projected: Vec<(f64, f64)> = path.points.iter().map(|p| (p.x, p.y)).collect();
        let d = build_path_data(&projected);
        if d.is_empty() {
            continue;
        }

        #[allow(clippy::cast_precision_loss)]
        let count = path.points.len() as f64;
        let line_width = path.points.iter().map(|p| p.line_width).sum::<f64>() / count;
        let opacity = path.points.iter().map(|p| p.opacity).sum::<f64>() / count;

        let element = Path::new()
            .set("id", format!("stroke-{}", path.id))
            .set("d", d)
            .set("fill", "none")
            .set("stroke", "black")
            .set("stroke-linecap", "round")
            .set("stroke-linejoin", "round")
            .set("stroke-width", format!("{line_width:.2}"))
            .set("stroke-opacity", format!("{opacity:.2}"))
            .set("data-start", format!("{:.1}", path.start_time))
            .set("data-end", format!("{:.1}", path.end_time));
        doc = doc.add(element);
    }

    finish(&doc)
}

#[cfg(test)]
mod tests {
    use sigtrace_motion::PhysicsPoint;
    use sigtrace_pipeline::AnalysisMetadata;

    use super::*;

    fn analysis(size: [u32; 2], strokes: Vec<Vec<RawPoint>>) -> SignatureAnalysis {
        SignatureAnalysis {
            strokes: strokes.into_iter().map(Stroke::new).collect(),
            metadata: AnalysisMetadata {
                original_size: size,
                ..AnalysisMetadata::default()
            },
        }
    }

    fn no_meta() -> SvgMetadata<'static> {
        SvgMetadata::default()
    }

    fn timed(x: f64, y: f64, time: f64) -> PhysicsPoint {
        PhysicsPoint {
            x,
            y,
            time,
            line_width: 2.0,
            opacity: 0.5,
        }
    }

    // --- build_path_data ---

    #[test]
    fn build_path_data_needs_two_points() {
        assert_eq!(build_path_data(&[]), "");
        assert_eq!(build_path_data(&[(5.0, 5.0)]), "");
    }

    #[test]
    fn build_path_data_three_points() {
        let d = build_path_data(&[(10.0, 15.0), (12.5, 18.3), (14.0, 20.1)]);
        assert_eq!(d, "M10,15 L12.5,18.3 L14,20.1");
    }

    // --- analysis_to_svg ---

    #[test]
    fn empty_analysis_is_a_valid_document() {
        let svg = analysis_to_svg(&analysis([300, 120], vec![]), &no_meta());
        assert!(svg.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(svg.contains(r#"width="300""#));
        assert!(svg.contains(r#"height="120""#));
        assert!(svg.contains(r#"viewBox="0 0 300 120""#));
        assert!(!svg.contains("<path"));
        // A childless document is written as a self-closing element.
        assert!(svg.contains("<svg "));
        assert!(svg.trim_end().ends_with("/>"), "{svg}");
        assert!(!svg.contains("</svg>"));
    }

    #[test]
    fn normalized_points_are_projected_onto_the_source_size() {
        let a = analysis(
            [200, 100],
            vec![vec![RawPoint::new(0, 0), RawPoint::new(10_000, 5_000)]],
        );
        let svg = analysis_to_svg(&a, &no_meta());
        assert!(svg.contains(r#"d="M0,0 L200,50""#), "{svg}");
    }

    #[test]
    fn stroke_width_is_mean_thickness() {
        let a = analysis(
            [200, 100],
            vec![vec![
                RawPoint::new(0, 0).with_thickness(100),
                RawPoint::new(5_000, 0).with_thickness(300),
            ]],
        );
        // Mean z of 200 on a 200 px wide source is 4 px.
        let svg = analysis_to_svg(&a, &no_meta());
        assert!(svg.contains(r#"stroke-width="4.00""#), "{svg}");
    }

    #[test]
    fn stroke_without_thickness_uses_default_width() {
        let a = analysis(
            [200, 100],
            vec![vec![RawPoint::new(0, 0), RawPoint::new(5_000, 0)]],
        );
        let svg = analysis_to_svg(&a, &no_meta());
        assert!(svg.contains(r#"stroke-width="1.50""#), "{svg}");
    }

    #[test]
    fn single_point_strokes_are_skipped() {
        let a = analysis(
            [200, 100],
            vec![
                vec![RawPoint::new(10, 10)],
                vec![RawPoint::new(0, 0), RawPoint::new(100, 100)],
            ],
        );
        let svg = analysis_to_svg(&a, &no_meta());
        assert_eq!(svg.matches("<path").count(), 1);
        assert!(svg.contains(r#"id="stroke-1""#));
    }

    #[test]
    fn missing_source_size_falls_back_to_normalized_square() {
        let svg = analysis_to_svg(&analysis([0, 0], vec![]), &no_meta());
        assert!(svg.contains(r#"viewBox="0 0 10000 10000""#));
    }

    // --- timeline_to_svg ---

    #[test]
    fn timeline_paths_carry_style_and_timing() {
        let paths = vec![StrokePath {
            id: 3,
            points: vec![timed(1.0, 2.0, 0.0), timed(3.0, 4.0, 12.5)],
            start_time: 0.0,
            end_time: 12.5,
        }];
        let svg = timeline_to_svg(&paths, 640, 360, &no_meta());
        assert!(svg.contains(r#"viewBox="0 0 640 360""#));
        assert!(svg.contains(r#"id="stroke-3""#));
        assert!(svg.contains(r#"d="M1,2 L3,4""#));
        assert!(svg.contains(r#"stroke-width="2.00""#));
        assert!(svg.contains(r#"stroke-opacity="0.50""#));
        assert!(svg.contains(r#"data-start="0.0""#));
        assert!(svg.contains(r#"data-end="12.5""#));
    }

    #[test]
    fn single_point_timeline_paths_are_skipped() {
        let paths = vec![StrokePath {
            id: 0,
            points: vec![timed(1.0, 1.0, 0.0)],
            start_time: 0.0,
            end_time: 0.0,
        }];
        let svg = timeline_to_svg(&paths, 10, 10, &no_meta());
        assert!(!svg.contains("<path"));
    }

    // --- metadata ---

    #[test]
    fn title_and_desc_emitted_before_paths() {
        let meta = SvgMetadata {
            title: Some("signature"),
            description: Some("traced at 400x100"),
            ..SvgMetadata::default()
        };
        let a = analysis(
            [100, 100],
            vec![vec![RawPoint::new(0, 0), RawPoint::new(100, 100)]],
        );
        let svg = analysis_to_svg(&a, &meta);
        let title_pos = svg.find("<title>signature</title>").unwrap_or(usize::MAX);
        let desc_pos = svg.find("<desc>traced at 400x100</desc>").unwrap_or(usize::MAX);
        let path_pos = svg.find("<path").unwrap_or(0);
        assert!(title_pos < path_pos);
        assert!(desc_pos < path_pos);
    }

    #[test]
    fn title_and_desc_omitted_when_none() {
        let svg = analysis_to_svg(&analysis([10, 10], vec![]), &no_meta());
        assert!(!svg.contains("<title>"));
        assert!(!svg.contains("<desc>"));
        assert!(!svg.contains("<metadata>"));
    }

    #[test]
    fn special_characters_in_title_are_escaped() {
        let meta = SvgMetadata {
            title: Some("A <B> & C"),
            ..SvgMetadata::default()
        };
        let svg = analysis_to_svg(&analysis([10, 10], vec![]), &meta);
        assert!(svg.contains("<title>A &lt;B&gt; &amp; C</title>"));
    }

    #[test]
    fn config_json_is_embedded_in_namespaced_metadata() {
        let meta = SvgMetadata {
            config_json: Some(r#"{"working_resolution":1024}"#),
            ..SvgMetadata::default()
        };
        let svg = timeline_to_svg(&[], 10, 10, &meta);
        assert!(svg.contains("<metadata>"));
        assert!(svg.contains(r#"<sigtrace:config xmlns:sigtrace="https://sigtrace.dev/ns/1">"#));
        assert!(svg.contains("</sigtrace:config>"));
    }
}

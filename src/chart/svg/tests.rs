use super::*;

fn spec(kind: ChartKind, values: Vec<f64>) -> ChartSpec {
    ChartSpec {
        kind,
        labels: (0..values.len()).map(|i| format!("L{i}")).collect(),
        values,
        title: "revenue by <year>".to_string(),
        x_label: "year".to_string(),
        y_label: "revenue".to_string(),
    }
}

fn render(spec: &ChartSpec) -> String {
    let image = SvgRenderer::default().render(spec).expect("renders");
    assert_eq!(image.mime_type, SVG_MIME_TYPE);
    String::from_utf8(image.bytes).expect("utf-8 svg")
}

#[test]
fn bar_chart_has_one_rect_per_value() {
    let svg = render(&spec(ChartKind::Bar, vec![100.0, 150.0, 75.0]));

    assert!(svg.starts_with("<svg"));
    assert!(svg.ends_with("</svg>"));
    assert_eq!(svg.matches(BAR_FILL).count(), 3);
    assert!(svg.contains("revenue by &lt;year&gt;"));
    assert!(svg.contains(">L2</text>"));
}

#[test]
fn line_chart_draws_polyline_and_markers() {
    let svg = render(&spec(ChartKind::Line, vec![1.0, 3.0, 2.0]));

    assert_eq!(svg.matches("<polyline").count(), 1);
    assert_eq!(svg.matches("<circle").count(), 3);
}

#[test]
fn scatter_chart_draws_points_only() {
    let svg = render(&spec(ChartKind::Scatter, vec![1.0, -3.0]));

    assert!(!svg.contains("<polyline"));
    assert_eq!(svg.matches(SCATTER_FILL).count(), 2);
}

#[test]
fn pie_chart_labels_percentages() {
    let svg = render(&spec(ChartKind::Pie, vec![1.0, 3.0]));

    assert_eq!(svg.matches("<path").count(), 2);
    assert!(svg.contains("L0 (25.0%)"));
    assert!(svg.contains("L1 (75.0%)"));
    // no axes on a pie
    assert!(!svg.contains("rotate(-90"));
}

#[test]
fn pie_with_single_slice_is_a_circle() {
    let svg = render(&spec(ChartKind::Pie, vec![5.0]));
    assert!(svg.contains("<circle"));
    assert!(svg.contains("(100.0%)"));
}

#[test]
fn pie_rejects_negative_and_zero_totals() {
    let renderer = SvgRenderer::default();
    assert!(matches!(
        renderer.render(&spec(ChartKind::Pie, vec![1.0, -1.0])),
        Err(AskDbError::InvalidChartData(ref m)) if m.contains("negative")
    ));
    assert!(matches!(
        renderer.render(&spec(ChartKind::Pie, vec![0.0, 0.0])),
        Err(AskDbError::InvalidChartData(ref m)) if m.contains("zero")
    ));
}

#[test]
fn flat_series_still_renders() {
    let svg = render(&spec(ChartKind::Bar, vec![0.0, 0.0]));
    assert!(!svg.contains("NaN"));
}

#[test]
fn helpers() {
    assert_eq!(escape(r#"a<b>&"c'"#), "a&lt;b&gt;&amp;&quot;c&apos;");
    assert_eq!(format_tick(2.0), "2");
    assert_eq!(format_tick(2.5), "2.50");
    assert_eq!(value_range(&[3.0, 5.0]), (0.0, 5.0));
    assert_eq!(value_range(&[-2.0, 1.0]), (-2.0, 1.0));
    assert_eq!(value_range(&[]), (0.0, 1.0));
    assert_eq!(SvgRenderer::new(10, 10), SvgRenderer::new(200, 150));
}

use anyhow::Result;
use patch_model::{Canvas, MetadataError, RecordId, parse_metadata};

const BARE: &str = r#"[
  {"id": 2, "patch_index": 14, "x": 0.25, "y": -0.5, "rotation": 1.0,
   "scale": 1.2, "squeeze": 0.1, "shear": 0.0, "red": 0.5, "green": 1.0, "blue": 0.0, "order": 1},
  {"id": 1, "patch_index": 3, "x": -0.75, "y": 0.0, "order": 0}
]"#;

#[test]
fn parses_bare_array_sorted_by_order() -> Result<()> {
    let records = parse_metadata(BARE)?;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, RecordId::Number(1));
    assert_eq!(records[1].patch_index, 14);
    assert_eq!(records[1].attributes.rotation, Some(1.0));
    assert_eq!(records[0].attributes.rotation, None);
    Ok(())
}

#[test]
fn parses_wrapped_document() -> Result<()> {
    let text = format!(r#"{{"patches": {BARE}}}"#);
    let records = parse_metadata(&text)?;
    assert_eq!(records.len(), 2);
    Ok(())
}

#[test]
fn rejects_invalid_documents() {
    assert!(matches!(
        parse_metadata("not json"),
        Err(MetadataError::Json(_))
    ));
    assert!(matches!(
        parse_metadata(r#"{"layers": []}"#),
        Err(MetadataError::UnexpectedShape)
    ));
    assert!(matches!(
        parse_metadata("42"),
        Err(MetadataError::UnexpectedShape)
    ));
}

#[test]
fn record_errors_name_the_field() {
    let err = parse_metadata(r#"[{"id": 1, "patch_index": 2, "y": 0.0}]"#).unwrap_err();
    assert!(matches!(err, MetadataError::Json(_)));
    assert!(err.to_string().contains("missing field `x`"), "{err}");

    let err = parse_metadata(r#"{"patches": [{"id": 1, "patch_index": -2, "x": 0.0, "y": 0.0}]}"#)
        .unwrap_err();
    assert!(matches!(err, MetadataError::Json(_)));
}

#[test]
fn results_land_on_canvas_in_local_units() -> Result<()> {
    let mut canvas = Canvas::new("mosaic");
    canvas.apply_results(&parse_metadata(BARE)?);

    let top = &canvas.patches()[1];
    assert_eq!(top.image.to_string(), "mosaic/14");
    let attrs = top.attributes.expect("converted attributes");
    assert_eq!(attrs.red, Some(128.0));
    assert_eq!(attrs.green, Some(255.0));
    assert_eq!(attrs.blue, Some(0.0));
    let rotation = attrs.rotation.expect("rotation");
    assert!((rotation - 55.6635311).abs() < 1e-9);

    assert!(canvas.patches()[0].attributes.is_none());
    Ok(())
}

#[test]
fn canvas_save_and_load() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested").join("canvas.json");

    let mut canvas = Canvas::new("mosaic");
    canvas.apply_results(&parse_metadata(BARE)?);
    canvas.save(&path)?;

    let loaded = Canvas::load(&path)?;
    assert_eq!(loaded, canvas);
    Ok(())
}

#[test]
fn loading_missing_canvas_fails_with_path() {
    let err = Canvas::load(std::path::Path::new("/nonexistent/canvas.json"))
        .expect_err("missing file");
    assert!(format!("{err:#}").contains("/nonexistent/canvas.json"));
}

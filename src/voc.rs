//! Pascal VOC XML annotations.
//!
//! Reads `<annotation>` files into [`VocAnnotation`], writes YOLO label text,
//! and can rewrite the `<folder>`/`<path>` tags in place. The `<annotation>`
//! element may be the document root or nested under a vendor wrapper element.

use log::{error, info, warn};
use quick_xml::events::{BytesDecl, BytesText, Event};
use quick_xml::{Reader, Writer};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PrepError, Result};
use crate::stem::stem;
use crate::types::{BndBox, ConversionStats, VocAnnotation, VocObject};
use crate::utils::{create_progress_bar, ensure_dir, file_name_str, list_files};

#[derive(Default)]
struct PartialBox {
    xmin: Option<f64>,
    xmax: Option<f64>,
    ymin: Option<f64>,
    ymax: Option<f64>,
}

impl PartialBox {
    fn finish(&self) -> Option<BndBox> {
        Some(BndBox {
            xmin: self.xmin?,
            xmax: self.xmax?,
            ymin: self.ymin?,
            ymax: self.ymax?,
        })
    }
}

fn parse_number<T: std::str::FromStr>(path: &Path, tag: &str, text: &str) -> Result<T> {
    text.trim()
        .parse()
        .map_err(|_| PrepError::InvalidAnnotation {
            path: path.to_path_buf(),
            message: format!("<{}> is not a number: {:?}", tag, text),
        })
}

/// Parse VOC XML text. `path` is only used in error messages.
pub fn parse_voc(xml: &str, path: &Path) -> Result<VocAnnotation> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut annotation = VocAnnotation::default();
    let mut stack: Vec<String> = Vec::new();
    let mut object: Option<(VocObject, PartialBox)> = None;
    let mut width = None;
    let mut height = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "object" {
                    object = Some((VocObject::default(), PartialBox::default()));
                }
                stack.push(name);
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"object" {
                    if let Some((mut obj, partial)) = object.take() {
                        obj.bndbox = partial.finish();
                        annotation.objects.push(obj);
                    }
                }
                stack.pop();
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| PrepError::xml(path, e))?;
                let tag = stack.last().map(String::as_str).unwrap_or_default();
                let parent = stack
                    .len()
                    .checked_sub(2)
                    .map(|i| stack[i].as_str())
                    .unwrap_or_default();
                match (&mut object, parent, tag) {
                    (Some((obj, _)), "object", "name") => obj.name = text.trim().to_string(),
                    (Some((obj, _)), "object", "difficult") => {
                        obj.difficult = parse_number::<i64>(path, tag, &text)? == 1;
                    }
                    (Some((_, partial)), "bndbox", coord) => {
                        let slot = match coord {
                            "xmin" => &mut partial.xmin,
                            "xmax" => &mut partial.xmax,
                            "ymin" => &mut partial.ymin,
                            "ymax" => &mut partial.ymax,
                            _ => continue,
                        };
                        *slot = Some(parse_number::<f64>(path, coord, &text)?);
                    }
                    (None, "annotation", "filename") if annotation.filename.is_empty() => {
                        annotation.filename = text.trim().to_string();
                    }
                    (None, "size", "width") => width = Some(parse_number::<u32>(path, tag, &text)?),
                    (None, "size", "height") => {
                        height = Some(parse_number::<u32>(path, tag, &text)?)
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(PrepError::xml(path, e)),
            _ => {}
        }
    }

    let invalid = |message: &str| PrepError::InvalidAnnotation {
        path: path.to_path_buf(),
        message: message.to_string(),
    };
    if annotation.filename.is_empty() {
        return Err(invalid("missing <filename>"));
    }
    annotation.width = width.ok_or_else(|| invalid("missing <size><width>"))?;
    annotation.height = height.ok_or_else(|| invalid("missing <size><height>"))?;
    if annotation.width == 0 || annotation.height == 0 {
        return Err(invalid("image size must be non-zero"));
    }
    Ok(annotation)
}

/// Read and parse one VOC XML file
pub fn read_voc(path: &Path) -> Result<VocAnnotation> {
    let xml = fs::read_to_string(path).map_err(|e| PrepError::io(path, e))?;
    parse_voc(&xml, path)
}

/// Convert a 1-based VOC box `(xmin, xmax, ymin, ymax)` to normalized
/// `(x_center, y_center, width, height)`, each clipped to `[0, 1]`.
pub fn convert_box(size: (u32, u32), bndbox: &BndBox) -> (f64, f64, f64, f64) {
    let dw = 1.0 / size.0 as f64;
    let dh = 1.0 / size.1 as f64;

    let x = (bndbox.xmin + bndbox.xmax) / 2.0 - 1.0;
    let y = (bndbox.ymin + bndbox.ymax) / 2.0 - 1.0;
    let w = bndbox.xmax - bndbox.xmin;
    let h = bndbox.ymax - bndbox.ymin;

    (
        (x * dw).clamp(0.0, 1.0),
        (y * dh).clamp(0.0, 1.0),
        (w * dw).clamp(0.0, 1.0),
        (h * dh).clamp(0.0, 1.0),
    )
}

/// Render YOLO label lines for every usable object.
///
/// Difficult objects, unknown classes and objects without a complete box are
/// skipped and counted in `stats`.
pub fn to_yolo_lines(
    annotation: &VocAnnotation,
    classes: &[String],
    stats: &mut ConversionStats,
) -> String {
    let mut yolo_data = String::with_capacity(annotation.objects.len() * 48);

    for object in &annotation.objects {
        if object.difficult {
            stats.skipped_difficult += 1;
            continue;
        }
        let Some(class_id) = classes.iter().position(|c| c == &object.name) else {
            warn!(
                "Unknown class '{}' in annotation for {}",
                object.name, annotation.filename
            );
            stats.skipped_unknown_class += 1;
            continue;
        };
        let Some(bndbox) = &object.bndbox else {
            warn!(
                "Object '{}' in {} has an incomplete <bndbox>",
                object.name, annotation.filename
            );
            continue;
        };

        let (x_center, y_center, width, height) =
            convert_box((annotation.width, annotation.height), bndbox);
        yolo_data.push_str(&format!(
            "{} {:.6} {:.6} {:.6} {:.6}\n",
            class_id, x_center, y_center, width, height
        ));
        stats.objects_written += 1;
    }

    yolo_data
}

fn xml_files(root: &Path) -> Result<Vec<PathBuf>> {
    Ok(list_files(root, None)?
        .into_iter()
        .filter(|path| path.extension().is_some_and(|ext| ext == "xml"))
        .collect())
}

fn convert_file(
    xml_path: &Path,
    label_root: &Path,
    output_root: &Path,
    classes: &[String],
) -> Result<ConversionStats> {
    let mut stats = ConversionStats::default();
    let annotation = read_voc(xml_path)?;

    // Mirror the folder layout of the source tree
    let relative_dir = xml_path
        .parent()
        .and_then(|dir| dir.strip_prefix(label_root).ok())
        .unwrap_or_else(|| Path::new(""));
    let output_dir = ensure_dir(&output_root.join(relative_dir))?;
    let output_path = output_dir.join(format!("{}.txt", stem(&annotation.filename)));

    let yolo_data = to_yolo_lines(&annotation, classes, &mut stats);
    fs::write(&output_path, yolo_data).map_err(|e| PrepError::io(&output_path, e))?;
    stats.converted += 1;
    Ok(stats)
}

/// Convert every VOC XML file under `label_root` into YOLO text under
/// `output_root`, keeping the relative folder of each file.
///
/// Files whose name matches `exclude` are skipped. Files that fail to parse or
/// write are logged and counted; the rest are still converted.
pub fn convert_tree<F>(
    label_root: &Path,
    output_root: &Path,
    classes: &[String],
    exclude: F,
) -> Result<ConversionStats>
where
    F: Fn(&str) -> bool,
{
    info!(
        "Converting XML annotations: {} -> {}",
        label_root.display(),
        output_root.display()
    );
    ensure_dir(output_root)?;

    let mut stats = ConversionStats::default();
    let (excluded, files): (Vec<PathBuf>, Vec<PathBuf>) = xml_files(label_root)?
        .into_iter()
        .partition(|path| file_name_str(path).is_some_and(&exclude));
    stats.excluded = excluded.len();

    let pb = create_progress_bar(files.len() as u64, "Convert");
    let results: Vec<ConversionStats> = files
        .par_iter()
        .map(|xml_path| {
            let result = convert_file(xml_path, label_root, output_root, classes);
            pb.inc(1);
            result.unwrap_or_else(|e| {
                error!("Failed to convert {}: {}", xml_path.display(), e);
                ConversionStats {
                    failed: 1,
                    ..Default::default()
                }
            })
        })
        .collect();
    pb.finish_with_message("Conversion complete");

    for file_stats in &results {
        stats.merge(file_stats);
    }
    stats.print_summary();
    Ok(stats)
}

fn annotation_filename(xml: &str, path: &Path) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut stack: Vec<Vec<u8>> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(e.name().as_ref().to_vec()),
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(t)) if stack.ends_with(&[b"annotation".to_vec(), b"filename".to_vec()]) => {
                let text = t.unescape().map_err(|e| PrepError::xml(path, e))?;
                return Ok(Some(text.trim().to_string()));
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(PrepError::xml(path, e)),
            _ => {}
        }
    }
}

/// Rewrite `<folder>` and `<path>` of one annotation so they point at
/// `<prefix><parent folder>/<filename>`. Returns `false` when the file has no
/// `<annotation><filename>` and was left untouched.
pub fn rewrite_xml_paths(xml_path: &Path, prefix: &str) -> Result<bool> {
    let xml = fs::read_to_string(xml_path).map_err(|e| PrepError::io(xml_path, e))?;
    let Some(filename) = annotation_filename(&xml, xml_path)? else {
        warn!(
            "No <annotation><filename> in {}, skipping",
            xml_path.display()
        );
        return Ok(false);
    };

    let parent_folder = xml_path
        .parent()
        .and_then(file_name_str)
        .unwrap_or_default();
    let folder_text = format!("{}{}", prefix, parent_folder);
    let path_text = format!("{}/{}", folder_text, filename);

    let mut reader = Reader::from_str(&xml);
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(|e| PrepError::xml(xml_path, e))?;

    let mut stack: Vec<Vec<u8>> = Vec::new();
    // Set while inside a <folder>/<path> that still needs its replacement text
    let mut pending: Option<&str> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| PrepError::xml(xml_path, e))?;
        let event = match event {
            Event::Eof => break,
            Event::Decl(_) => continue,
            Event::Start(e) => {
                stack.push(e.name().as_ref().to_vec());
                let inside_annotation = stack.len() >= 2
                    && stack[stack.len() - 2].as_slice() == b"annotation";
                pending = match e.name().as_ref() {
                    b"folder" if inside_annotation => Some(folder_text.as_str()),
                    b"path" if inside_annotation => Some(path_text.as_str()),
                    _ => None,
                };
                Event::Start(e)
            }
            Event::Text(t) => match pending.take() {
                Some(replacement) => Event::Text(BytesText::new(replacement)),
                None => Event::Text(t),
            },
            Event::End(e) => {
                if let Some(replacement) = pending.take() {
                    writer
                        .write_event(Event::Text(BytesText::new(replacement)))
                        .map_err(|e| PrepError::xml(xml_path, e))?;
                }
                stack.pop();
                Event::End(e)
            }
            other => other,
        };
        writer
            .write_event(event)
            .map_err(|e| PrepError::xml(xml_path, e))?;
    }

    fs::write(xml_path, writer.into_inner()).map_err(|e| PrepError::io(xml_path, e))?;
    Ok(true)
}

/// Rewrite the path tags of every XML file under `label_root`.
///
/// Returns the number of rewritten files; failures are logged and skipped.
pub fn rewrite_tree(label_root: &Path, prefix: &str) -> Result<usize> {
    info!("Rewriting XML paths under {}", label_root.display());
    let files = xml_files(label_root)?;
    let pb = create_progress_bar(files.len() as u64, "Rewrite");

    let rewritten = files
        .par_iter()
        .filter(|xml_path| {
            let result = rewrite_xml_paths(xml_path, prefix);
            pb.inc(1);
            match result {
                Ok(changed) => changed,
                Err(e) => {
                    error!("Failed to rewrite {}: {}", xml_path.display(), e);
                    false
                }
            }
        })
        .count();
    pb.finish_with_message("Rewrite complete");

    info!("Rewrote paths in {} of {} XML file(s)", rewritten, files.len());
    Ok(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<comp_cd>
  <annotation>
    <folder>old</folder>
    <filename>10060_0_m_1.jpg</filename>
    <path>C:/vendor/10060_0_m_1.jpg</path>
    <size>
      <width>200</width>
      <height>100</height>
      <depth>3</depth>
    </size>
    <object>
      <name>snack</name>
      <difficult>0</difficult>
      <bndbox>
        <xmin>21</xmin>
        <ymin>11</ymin>
        <xmax>61</xmax>
        <ymax>51</ymax>
      </bndbox>
    </object>
    <object>
      <name>drink</name>
      <difficult>1</difficult>
      <bndbox>
        <xmin>1</xmin>
        <ymin>1</ymin>
        <xmax>2</xmax>
        <ymax>2</ymax>
      </bndbox>
    </object>
    <object>
      <name>unknown</name>
      <bndbox>
        <xmin>1</xmin>
        <ymin>1</ymin>
        <xmax>2</xmax>
        <ymax>2</ymax>
      </bndbox>
    </object>
  </annotation>
</comp_cd>
"#;

    fn classes() -> Vec<String> {
        vec!["drink".to_string(), "snack".to_string()]
    }

    #[test]
    fn test_parse_voc_nested_annotation() {
        let annotation = parse_voc(SAMPLE, Path::new("sample.xml")).unwrap();
        assert_eq!(annotation.filename, "10060_0_m_1.jpg");
        assert_eq!(annotation.width, 200);
        assert_eq!(annotation.height, 100);
        assert_eq!(annotation.objects.len(), 3);
        assert_eq!(annotation.objects[0].name, "snack");
        assert!(!annotation.objects[0].difficult);
        assert!(annotation.objects[1].difficult);
        assert_eq!(
            annotation.objects[0].bndbox,
            Some(BndBox {
                xmin: 21.0,
                xmax: 61.0,
                ymin: 11.0,
                ymax: 51.0
            })
        );
    }

    #[test]
    fn test_parse_voc_missing_size() {
        let xml = "<annotation><filename>a.jpg</filename></annotation>";
        let result = parse_voc(xml, Path::new("a.xml"));
        assert!(matches!(result, Err(PrepError::InvalidAnnotation { .. })));
    }

    #[test]
    fn test_convert_box() {
        let bndbox = BndBox {
            xmin: 21.0,
            xmax: 61.0,
            ymin: 11.0,
            ymax: 51.0,
        };
        let (x, y, w, h) = convert_box((200, 100), &bndbox);
        assert!((x - 0.2).abs() < 1e-9);
        assert!((y - 0.3).abs() < 1e-9);
        assert!((w - 0.2).abs() < 1e-9);
        assert!((h - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_convert_box_clips() {
        let bndbox = BndBox {
            xmin: 0.0,
            xmax: 500.0,
            ymin: 0.0,
            ymax: 1.0,
        };
        let (x, y, w, h) = convert_box((200, 100), &bndbox);
        assert_eq!(w, 1.0);
        assert!(x <= 1.0);
        assert_eq!(y, 0.0);
        assert!((h - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_to_yolo_lines_skips_difficult_and_unknown() {
        let annotation = parse_voc(SAMPLE, Path::new("sample.xml")).unwrap();
        let mut stats = ConversionStats::default();
        let lines = to_yolo_lines(&annotation, &classes(), &mut stats);

        assert_eq!(lines, "1 0.200000 0.300000 0.200000 0.400000\n");
        assert_eq!(stats.objects_written, 1);
        assert_eq!(stats.skipped_difficult, 1);
        assert_eq!(stats.skipped_unknown_class, 1);
    }

    #[test]
    fn test_convert_tree_mirrors_folders() {
        let temp_dir = tempfile::tempdir().unwrap();
        let label_root = temp_dir.path().join("label");
        let output_root = temp_dir.path().join("label_coco");
        fs::create_dir_all(label_root.join("10060_snack")).unwrap();
        fs::write(label_root.join("10060_snack/a.xml"), SAMPLE).unwrap();
        fs::write(label_root.join("10060_snack/a_meta.xml"), SAMPLE).unwrap();
        fs::write(label_root.join("10060_snack/broken.xml"), "<annotation>").unwrap();

        let stats = convert_tree(
            &label_root,
            &output_root,
            &classes(),
            crate::copy::name_contains("meta"),
        )
        .unwrap();

        assert_eq!(stats.converted, 1);
        assert_eq!(stats.excluded, 1);
        assert_eq!(stats.failed, 1);
        let label = output_root.join("10060_snack/10060_0_m_1.txt");
        assert_eq!(
            fs::read_to_string(label).unwrap(),
            "1 0.200000 0.300000 0.200000 0.400000\n"
        );
    }

    #[test]
    fn test_xml_files_includes_hidden_entries() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join(".10060_snack")).unwrap();
        fs::write(root.join(".10060_snack/a.xml"), SAMPLE).unwrap();
        fs::write(root.join(".b.xml"), SAMPLE).unwrap();
        fs::write(root.join("c.json"), "{}").unwrap();

        let files = xml_files(root).unwrap();
        assert_eq!(files, vec![root.join(".10060_snack/a.xml"), root.join(".b.xml")]);
    }

    #[test]
    fn test_rewrite_xml_paths() {
        let temp_dir = tempfile::tempdir().unwrap();
        let folder = temp_dir.path().join("10060_snack");
        fs::create_dir_all(&folder).unwrap();
        let xml_path = folder.join("a.xml");
        fs::write(&xml_path, SAMPLE).unwrap();

        assert!(rewrite_xml_paths(&xml_path, "../../image/").unwrap());

        let rewritten = fs::read_to_string(&xml_path).unwrap();
        assert!(rewritten.starts_with("<?xml"));
        assert!(rewritten.contains("<folder>../../image/10060_snack</folder>"));
        assert!(rewritten.contains("<path>../../image/10060_snack/10060_0_m_1.jpg</path>"));
        // everything else survives the rewrite
        let annotation = read_voc(&xml_path).unwrap();
        assert_eq!(annotation.objects.len(), 3);
        assert_eq!(annotation.width, 200);
    }

    #[test]
    fn test_rewrite_skips_without_annotation() {
        let temp_dir = tempfile::tempdir().unwrap();
        let xml_path = temp_dir.path().join("other.xml");
        fs::write(&xml_path, "<root><filename>a.jpg</filename></root>").unwrap();

        assert!(!rewrite_xml_paths(&xml_path, "../../image/").unwrap());
        assert_eq!(
            fs::read_to_string(&xml_path).unwrap(),
            "<root><filename>a.jpg</filename></root>"
        );
    }
}

//! Direct access to the xlsx package for the sheet protection record.
//!
//! Neither codec exposes a legacy password hash, so the reader scans each
//! sheet part for `<sheetProtection>` and the writer patches the hash into
//! the parts it just produced. Untouched entries are copied raw.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek, Write};

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesStart, Event};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::conf::{C_PATH_PART_WORKBOOK, C_PATH_PART_WORKBOOK_RELS, C_TAG_SHEET_PROTECTION};
use crate::spec::{ExcelError, SpecSheetProtection};

////////////////////////////////////////////////////////////////////////////////
// #region PartLookup

fn read_part_text<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<String, ExcelError> {
    let mut file = archive.by_name(path)?;
    let mut c_text = String::new();
    file.read_to_string(&mut c_text)?;
    Ok(c_text)
}

/// Resolve a relationship target against the `xl/` folder.
fn derive_part_path(target: &str) -> String {
    if let Some(c_rest) = target.strip_prefix('/') {
        c_rest.to_string()
    } else if target.starts_with("xl/") {
        target.to_string()
    } else {
        format!("xl/{target}")
    }
}

fn load_relationship_targets<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<BTreeMap<String, String>, ExcelError> {
    let c_xml = read_part_text(archive, C_PATH_PART_WORKBOOK_RELS)?;
    let mut reader = Reader::from_str(&c_xml);
    let mut dict_target_by_id = BTreeMap::new();

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(event) | Event::Empty(event)
                if event.local_name().as_ref() == b"Relationship" =>
            {
                let id = event.try_get_attribute("Id")?;
                let target = event.try_get_attribute("Target")?;
                if let (Some(id), Some(target)) = (id, target) {
                    dict_target_by_id.insert(
                        id.decode_and_unescape_value(reader.decoder())?.into_owned(),
                        derive_part_path(&target.decode_and_unescape_value(reader.decoder())?),
                    );
                }
            }
            _ => {}
        }
    }
    Ok(dict_target_by_id)
}

/// Sheet names in workbook order, each with its part path.
fn load_sheet_parts<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Vec<(String, String)>, ExcelError> {
    let dict_target_by_id = load_relationship_targets(archive)?;
    let c_xml = read_part_text(archive, C_PATH_PART_WORKBOOK)?;
    let mut reader = Reader::from_str(&c_xml);
    let mut l_sheets = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(event) | Event::Empty(event)
                if event.local_name().as_ref() == b"sheet" =>
            {
                let mut name = None;
                let mut id = None;
                for attribute in event.attributes() {
                    let attribute = attribute?;
                    match attribute.key.local_name().as_ref() {
                        b"name" => {
                            name = Some(
                                attribute
                                    .decode_and_unescape_value(reader.decoder())?
                                    .into_owned(),
                            );
                        }
                        b"id" => {
                            id = Some(
                                attribute
                                    .decode_and_unescape_value(reader.decoder())?
                                    .into_owned(),
                            );
                        }
                        _ => {}
                    }
                }
                if let (Some(name), Some(id)) = (name, id)
                    && let Some(path) = dict_target_by_id.get(&id)
                {
                    l_sheets.push((name, path.clone()));
                }
            }
            _ => {}
        }
    }
    Ok(l_sheets)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ProtectionRead

fn derive_protection_from_sheet_xml(c_xml: &str) -> Result<SpecSheetProtection, ExcelError> {
    let mut reader = Reader::from_str(c_xml);
    loop {
        match reader.read_event()? {
            Event::Eof => return Ok(SpecSheetProtection::default()),
            Event::Start(event) | Event::Empty(event)
                if event.local_name().as_ref() == C_TAG_SHEET_PROTECTION.as_bytes() =>
            {
                let mut protection = SpecSheetProtection::default();
                for attribute in event.attributes() {
                    let attribute = attribute?;
                    let value = attribute.decode_and_unescape_value(reader.decoder())?;
                    match attribute.key.local_name().as_ref() {
                        b"sheet" => {
                            protection.if_protected = matches!(value.as_ref(), "1" | "true");
                        }
                        b"password" => protection.password_hash = Some(value.to_uppercase()),
                        _ => {}
                    }
                }
                return Ok(protection);
            }
            _ => {}
        }
    }
}

/// Protection record of every sheet in the package, keyed by sheet name.
pub fn read_sheet_protections(
    v_bytes: &[u8],
) -> Result<BTreeMap<String, SpecSheetProtection>, ExcelError> {
    let mut archive = ZipArchive::new(Cursor::new(v_bytes))?;
    let mut dict_protection = BTreeMap::new();
    for (name, path) in load_sheet_parts(&mut archive)? {
        let c_xml = read_part_text(&mut archive, &path)?;
        dict_protection.insert(name, derive_protection_from_sheet_xml(&c_xml)?);
    }
    Ok(dict_protection)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ProtectionWrite

/// Add `password="{hash}"` to the first `<sheetProtection>` element.
fn patch_sheet_protection_xml(c_xml: &str, password_hash: &str) -> Result<Vec<u8>, ExcelError> {
    let mut reader = Reader::from_str(c_xml);
    let mut writer = Writer::new(Vec::with_capacity(c_xml.len() + 32));

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Empty(event)
                if event.local_name().as_ref() == C_TAG_SHEET_PROTECTION.as_bytes() =>
            {
                let mut element = BytesStart::new(C_TAG_SHEET_PROTECTION);
                element.push_attribute(("password", password_hash));
                for attribute in event.attributes() {
                    let attribute = attribute?;
                    if attribute.key.local_name().as_ref() != b"password" {
                        element.push_attribute(attribute);
                    }
                }
                writer.write_event(Event::Empty(element))?;
            }
            event => writer.write_event(event)?,
        }
    }
    Ok(writer.into_inner())
}

/// Rewrite a saved package so each listed sheet carries its password hash.
pub fn apply_sheet_protection_hashes(
    v_bytes: Vec<u8>,
    dict_hash_by_sheet: &BTreeMap<String, String>,
) -> Result<Vec<u8>, ExcelError> {
    if dict_hash_by_sheet.is_empty() {
        return Ok(v_bytes);
    }

    let mut archive = ZipArchive::new(Cursor::new(v_bytes.as_slice()))?;
    let dict_hash_by_part: BTreeMap<String, &String> = load_sheet_parts(&mut archive)?
        .into_iter()
        .filter_map(|(name, path)| dict_hash_by_sheet.get(&name).map(|hash| (path, hash)))
        .collect();

    let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(v_bytes.len() + 256)));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for n_idx in 0..archive.len() {
        let c_name = archive.by_index_raw(n_idx)?.name().to_string();
        match dict_hash_by_part.get(&c_name) {
            Some(password_hash) => {
                let mut c_xml = String::new();
                archive.by_index(n_idx)?.read_to_string(&mut c_xml)?;
                let v_xml = patch_sheet_protection_xml(&c_xml, password_hash)?;
                writer.start_file(c_name, options)?;
                writer.write_all(&v_xml)?;
            }
            None => writer.raw_copy_file(archive.by_index_raw(n_idx)?)?,
        }
    }

    Ok(writer.finish()?.into_inner())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

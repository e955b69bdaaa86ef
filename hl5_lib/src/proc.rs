//! Converters between the raw game files and their editable forms.
//!
//! Each processor owns one family of archive files: a fixed list of target
//! paths, a working subdirectory for the editable output, and the two
//! conversions between them. Table files become JSON documents named after
//! the target (`quest_0.dat` edits as `quest/quest_0.dat.json`); images
//! become PNG files with a small JSON sidecar for the header fields that a
//! PNG cannot carry.
//!
//! Files of the archive not claimed by any processor round-trip untouched
//! through the raw tree.
use std::{
    fs,
    io::{BufReader, BufWriter, Cursor, Write},
    path::{Path, PathBuf},
};

use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    error::{ProcessError, ProcessFileError},
    gbm::Gbm,
    mgr::Mgr,
    record::{read_pascal_array, write_pascal_array, Codec, Document, Schema},
    scn::Scn,
    strings, Diagnostics,
};

pub trait Processor {
    fn name(&self) -> &'static str;

    /// Subdirectory of the base directory holding this processor's
    /// editable files.
    fn work_dir(&self) -> &'static str;

    /// Archive-relative paths this processor converts.
    fn targets(&self) -> Vec<String>;

    /// Convert one raw file into its editable form under `work_dir`.
    fn disassemble(
        &self,
        target: &str,
        data: &[u8],
        work_dir: &Path,
        diag: &mut Diagnostics,
    ) -> Result<(), ProcessError>;

    /// Convert the editable form under `work_dir` back to raw file bytes.
    fn assemble(
        &self,
        target: &str,
        work_dir: &Path,
        diag: &mut Diagnostics,
    ) -> Result<Vec<u8>, ProcessError>;

    /// Disassemble every target from `base_dir/raw`.
    fn disassemble_all(
        &self,
        base_dir: &Path,
        diag: &mut Diagnostics,
    ) -> Result<(), ProcessFileError> {
        let work_dir = base_dir.join(self.work_dir());
        fs::create_dir_all(&work_dir).map_err(|e| ProcessFileError {
            path: work_dir.display().to_string(),
            source: e.into(),
        })?;
        for target in self.targets() {
            info!(target: self.name(), "Disassemble: {target}");
            let data = fs::read(base_dir.join("raw").join(&target)).map_err(|e| {
                ProcessFileError {
                    path: target.clone(),
                    source: e.into(),
                }
            })?;
            self.disassemble(&target, &data, &work_dir, diag)
                .map_err(|source| ProcessFileError {
                    path: target.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Assemble every target into its path under `staging_dir`.
    fn assemble_all(
        &self,
        base_dir: &Path,
        staging_dir: &Path,
        diag: &mut Diagnostics,
    ) -> Result<(), ProcessFileError> {
        let work_dir = base_dir.join(self.work_dir());
        for target in self.targets() {
            info!(target: self.name(), "Assemble: {target}");
            let bytes = self
                .assemble(&target, &work_dir, diag)
                .map_err(|source| ProcessFileError {
                    path: target.clone(),
                    source,
                })?;
            let dest = staging_dir.join(&target);
            let write = |bytes| -> Result<(), ProcessError> {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                Ok(fs::write(&dest, bytes)?)
            };
            write(bytes).map_err(|source| ProcessFileError {
                path: target.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// All processors in their fixed conversion order.
pub fn processors() -> Vec<Box<dyn Processor>> {
    vec![
        Box::new(common_text()),
        Box::new(SceneProcessor),
        Box::new(quest()),
        Box::new(enemy()),
        Box::new(class()),
        Box::new(skill()),
        Box::new(ItemProcessor),
        Box::new(MgrProcessor),
        Box::new(GbmProcessor),
    ]
}

fn basename(target: &str) -> &str {
    target.rsplit('/').next().unwrap_or(target)
}

fn sidecar_path(work_dir: &Path, target: &str) -> PathBuf {
    work_dir.join(format!("{}.json", basename(target)))
}

fn write_json_pretty(path: &Path, value: &impl Serialize) -> Result<(), ProcessError> {
    let mut writer = BufWriter::new(fs::File::create(path)?);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
    value.serialize(&mut ser)?;
    writer.flush()?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ProcessError> {
    Ok(serde_json::from_reader(BufReader::new(fs::File::open(
        path,
    )?))?)
}

/// A table file: a 16-bit Pascal array of elements sharing one schema.
pub struct TableProcessor {
    name: &'static str,
    work_dir: &'static str,
    targets: Vec<String>,
    schema: Schema,
}

impl Processor for TableProcessor {
    fn name(&self) -> &'static str {
        self.name
    }

    fn work_dir(&self) -> &'static str {
        self.work_dir
    }

    fn targets(&self) -> Vec<String> {
        self.targets.clone()
    }

    fn disassemble(
        &self,
        target: &str,
        data: &[u8],
        work_dir: &Path,
        diag: &mut Diagnostics,
    ) -> Result<(), ProcessError> {
        let records = read_pascal_array::<_, ProcessError, _>(
            &mut Cursor::new(data),
            false,
            |bytes, _| Ok(self.schema.read_element(bytes, diag)?),
        )?;
        write_json_pretty(&sidecar_path(work_dir, target), &records)
    }

    fn assemble(
        &self,
        target: &str,
        work_dir: &Path,
        diag: &mut Diagnostics,
    ) -> Result<Vec<u8>, ProcessError> {
        let records: Vec<Document> = read_json(&sidecar_path(work_dir, target))?;
        let mut bytes = Vec::new();
        write_pascal_array::<_, ProcessError, _>(&mut bytes, false, &records, |doc, _| {
            Ok(self.schema.write_element(doc, diag)?)
        })?;
        Ok(bytes)
    }
}

pub fn quest() -> TableProcessor {
    TableProcessor {
        name: "questproc",
        work_dir: "quest",
        targets: (0..3).map(|i| format!("c/csv/quest_{i}.dat")).collect(),
        schema: Schema::new(vec![
            ("data1", Codec::Bytes(Some(3))),
            ("name", Codec::LegacyString),
            ("desc", Codec::LegacyString),
            ("type", Codec::LegacyString),
            ("data2", Codec::Bytes(Some(38))),
        ])
        .with_display_order(&["name", "desc", "type", "data1", "data2"]),
    }
}

pub fn class() -> TableProcessor {
    TableProcessor {
        name: "classproc",
        work_dir: "misc",
        targets: vec!["c/csv/class.dat".to_string()],
        schema: Schema::new(vec![
            ("name", Codec::LegacyString),
            ("data", Codec::Bytes(Some(59))),
        ]),
    }
}

pub fn skill() -> TableProcessor {
    // There is no skill_04.dat in the archive.
    let targets = [0, 1, 2, 3, 5]
        .iter()
        .map(|i| format!("c/csv/skill_{i:02}.dat"))
        .collect();
    TableProcessor {
        name: "skillproc",
        work_dir: "skill",
        targets,
        schema: Schema::new(vec![
            ("name", Codec::LegacyString),
            ("data", Codec::Bytes(Some(47))),
            ("desc", Codec::LegacyString),
        ])
        .with_display_order(&["name", "desc", "data"]),
    }
}

pub fn enemy() -> TableProcessor {
    let targets = [
        "c/csv/enemy_0.dat",
        "c/csv/enemy_1.dat",
        "c/csv/enemy_2.dat",
        "c/csv/enemy_expert_0.dat",
        "c/csv/enemy_expert_1.dat",
        "c/csv/enemy_expert_2.dat",
    ]
    .iter()
    .map(|t| t.to_string())
    .collect();

    // Unnamed parameters keep their offset into the fixed part of the
    // record; their meaning is unknown but their widths are not.
    TableProcessor {
        name: "enemyproc",
        work_dir: "enemy",
        targets,
        schema: Schema::new(vec![
            ("name", Codec::LegacyString),
            ("param_0h", Codec::int(8)),
            ("level", Codec::int(8)),
            ("param_2h", Codec::int(8)),
            ("param_3h", Codec::int(8)),
            ("atk", Codec::int(16)),
            ("param_6h", Codec::int(8)),
            ("param_7h", Codec::int(8)),
            ("param_8h", Codec::int(16)),
            ("param_ah", Codec::int(16)),
            ("param_ch", Codec::int(8)),
            ("param_dh", Codec::int(16)),
            ("param_fh", Codec::int(8)),
            ("param_10h", Codec::int(8)),
            ("param_11h", Codec::int(16)),
            ("param_13h", Codec::int(16)),
            ("param_15h", Codec::int(8)),
            ("param_16h", Codec::int(16)),
            ("param_18h", Codec::int(8)),
            ("param_19h", Codec::int(8)),
            ("param_1ah", Codec::int(16)),
            ("param_1ch", Codec::int(16)),
            ("param_1eh", Codec::int(8)),
            ("param_1fh", Codec::int(16)),
            ("param_21h", Codec::int(8)),
            ("param_22h", Codec::int(8)),
            ("param_23h", Codec::int(16)),
            ("param_25h", Codec::int(16)),
            ("param_27h", Codec::int(32)),
            ("param_2bh", Codec::int(32)),
            ("param_2fh", Codec::int(32)),
            ("param_33h", Codec::int(32)),
            ("param_37h", Codec::int(32)),
            ("param_3bh", Codec::int(32)),
            ("param_3fh", Codec::int(32)),
            ("param_43h", Codec::int(8)),
            ("param_44h", Codec::int(8)),
            ("param_45h", Codec::int(8)),
            ("param_46h", Codec::int(8)),
            ("param_47h", Codec::int(8)),
            ("param_48h", Codec::int(8)),
            ("param_49h", Codec::int(8)),
            ("param_4ah", Codec::int(8)),
            ("param_4bh", Codec::int(16)),
            ("param_4dh", Codec::int(8)),
            ("param_4eh", Codec::int(8)),
            ("param_4fh", Codec::int(8)),
            ("hp", Codec::int(32)),
            ("param_54h", Codec::int(16)),
            ("param_56h", Codec::int(16)),
            ("param_58h", Codec::int(16)),
            ("param_5ah", Codec::int(16)),
            ("param_5ch", Codec::int(16)),
            ("param_5eh", Codec::int(16)),
            ("param_60h", Codec::int(16)),
            ("param_62h", Codec::int(16)),
            ("param_64h", Codec::int(16)),
            ("param_66h", Codec::int(16)),
            ("param_68h", Codec::int(16)),
            ("param_6ah", Codec::int(16)),
            ("param_6ch", Codec::int(16)),
            ("param_6eh", Codec::int(16)),
            ("param_70h", Codec::int(16)),
            ("param_72h", Codec::int(16)),
            ("param_74h", Codec::int(16)),
            ("param_76h", Codec::int(8)),
            ("param_77h", Codec::int(8)),
            ("param_78h", Codec::int(8)),
            ("param_79h", Codec::int(8)),
            ("param_7ah", Codec::int(8)),
            ("param_7bh", Codec::int(8)),
            ("param_7ch", Codec::int(8)),
            ("param_7dh", Codec::int(16)),
            ("param_7fh", Codec::int(8)),
        ]),
    }
}

/// Flat text tables: a Pascal array of bare legacy strings.
pub struct CommonTextProcessor {
    targets: Vec<String>,
}

pub fn common_text() -> CommonTextProcessor {
    let targets = [
        "c/csv/common_text.dat",
        "c/csv/name.dat",
        "c/csv/mission_text.dat",
        "c/csv/menu_text.dat",
        "c/csv/ingame_text.dat",
        "c/csv/tips.dat",
    ]
    .iter()
    .map(|t| t.to_string())
    .collect();
    CommonTextProcessor { targets }
}

impl Processor for CommonTextProcessor {
    fn name(&self) -> &'static str {
        "commontextproc"
    }

    fn work_dir(&self) -> &'static str {
        "common_text"
    }

    fn targets(&self) -> Vec<String> {
        self.targets.clone()
    }

    fn disassemble(
        &self,
        target: &str,
        data: &[u8],
        work_dir: &Path,
        diag: &mut Diagnostics,
    ) -> Result<(), ProcessError> {
        let texts =
            read_pascal_array::<_, ProcessError, _>(&mut Cursor::new(data), false, |bytes, _| {
                Ok(strings::read_pascal_string(&mut Cursor::new(bytes), diag)?)
            })?;
        write_json_pretty(&sidecar_path(work_dir, target), &texts)
    }

    fn assemble(
        &self,
        target: &str,
        work_dir: &Path,
        diag: &mut Diagnostics,
    ) -> Result<Vec<u8>, ProcessError> {
        let texts: Vec<String> = read_json(&sidecar_path(work_dir, target))?;
        let mut bytes = Vec::new();
        write_pascal_array::<_, ProcessError, _>(&mut bytes, false, &texts, |text, _| {
            let mut element = Vec::new();
            strings::write_pascal_string(&mut element, text, diag)?;
            Ok(element)
        })?;
        Ok(bytes)
    }
}

/// Item tables.
///
/// Every item starts with the same general fields; the tail depends on the
/// item group, which is the numeric suffix of the file name. Groups 0 to 10
/// are equipment with a fixed stat struct, the remaining groups keep their
/// tail as opaque bytes.
pub struct ItemProcessor;

fn equipment_schema() -> Schema {
    Schema::new(vec![
        ("sprite_id", Codec::int(16)),
        ("sprite_color_effect", Codec::int(16)),
        // 1 is fast, 0 is slow.
        ("atk_speed", Codec::int(8)),
        ("class", Codec::int(8)),
        ("min_atk/phys_def", Codec::int(16)),
        ("max_atk/magic_def", Codec::int(16)),
        ("param_ah", Codec::int(16)),
        ("param_ch", Codec::int(8)),
        ("param_dh", Codec::int(8)),
        ("param_eh", Codec::int(8)),
        ("param_fh", Codec::int(8)),
        ("param_10h", Codec::int(8)),
        ("param_11h", Codec::int(8)),
        ("param_12h", Codec::int(8)),
        ("param_13h", Codec::int(8)),
        ("param_14h", Codec::int(8)),
    ])
}

fn item_schema(group: u32) -> Schema {
    let extras = if group <= 10 {
        Codec::Struct(equipment_schema())
    } else {
        Codec::Bytes(None)
    };
    Schema::new(vec![
        ("type_id", Codec::int(16)),
        ("name", Codec::LegacyString),
        ("price", Codec::int(32)),
        ("desc", Codec::LegacyString),
        ("extras", extras),
    ])
    .with_display_order(&["name", "desc", "price", "type_id", "extras"])
}

fn item_group(target: &str) -> Option<u32> {
    basename(target)
        .strip_prefix("item_")?
        .strip_suffix(".dat")?
        .parse()
        .ok()
}

impl Processor for ItemProcessor {
    fn name(&self) -> &'static str {
        "itemproc"
    }

    fn work_dir(&self) -> &'static str {
        "item"
    }

    fn targets(&self) -> Vec<String> {
        (0..19).map(|i| format!("c/csv/item_{i:02}.dat")).collect()
    }

    fn disassemble(
        &self,
        target: &str,
        data: &[u8],
        work_dir: &Path,
        diag: &mut Diagnostics,
    ) -> Result<(), ProcessError> {
        let group =
            item_group(target).ok_or_else(|| ProcessError::UnknownItemGroup(target.to_string()))?;
        let schema = item_schema(group);
        let records = read_pascal_array::<_, ProcessError, _>(
            &mut Cursor::new(data),
            false,
            |bytes, _| Ok(schema.read_element(bytes, diag)?),
        )?;
        write_json_pretty(&sidecar_path(work_dir, target), &records)
    }

    fn assemble(
        &self,
        target: &str,
        work_dir: &Path,
        diag: &mut Diagnostics,
    ) -> Result<Vec<u8>, ProcessError> {
        let group =
            item_group(target).ok_or_else(|| ProcessError::UnknownItemGroup(target.to_string()))?;
        let schema = item_schema(group);
        let records: Vec<Document> = read_json(&sidecar_path(work_dir, target))?;
        let mut bytes = Vec::new();
        write_pascal_array::<_, ProcessError, _>(&mut bytes, false, &records, |doc, _| {
            Ok(schema.write_element(doc, diag)?)
        })?;
        Ok(bytes)
    }
}

pub struct SceneProcessor;

impl Processor for SceneProcessor {
    fn name(&self) -> &'static str {
        "sceneproc"
    }

    fn work_dir(&self) -> &'static str {
        "scene"
    }

    fn targets(&self) -> Vec<String> {
        (0..218).map(|i| format!("c/map/{i:05}.scn")).collect()
    }

    fn disassemble(
        &self,
        target: &str,
        data: &[u8],
        work_dir: &Path,
        diag: &mut Diagnostics,
    ) -> Result<(), ProcessError> {
        let scn = Scn::read(&mut Cursor::new(data), diag)?;
        write_json_pretty(&sidecar_path(work_dir, target), &scn)
    }

    fn assemble(
        &self,
        target: &str,
        work_dir: &Path,
        diag: &mut Diagnostics,
    ) -> Result<Vec<u8>, ProcessError> {
        let scn: Scn = read_json(&sidecar_path(work_dir, target))?;
        let mut bytes = Vec::new();
        scn.write(&mut bytes, diag)?;
        Ok(bytes)
    }
}

/// Header fields of a GBM image that its PNG cannot carry.
#[derive(Debug, Serialize, Deserialize)]
struct GbmMeta {
    color_bit: u8,
    unk0: u8,
}

/// Standalone GBM images, edited as `<name>.gbm.png` plus a sidecar with
/// the header fields.
pub struct GbmProcessor;

impl Processor for GbmProcessor {
    fn name(&self) -> &'static str {
        "gbmproc"
    }

    fn work_dir(&self) -> &'static str {
        "gbm_sprites"
    }

    fn targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = (0..22).map(|i| format!("c/map/face_{i:02}.gbm")).collect();
        targets.extend((0..3).map(|i| format!("c/map/fgi_{i:03}.gbm")));
        targets.extend((0..255).map(|i| format!("c/map/obj_{i:03}.gbm")));
        targets.extend((0..62).map(|i| format!("c/map/tile_{i:03}.gbm")));
        targets
    }

    fn disassemble(
        &self,
        target: &str,
        data: &[u8],
        work_dir: &Path,
        _diag: &mut Diagnostics,
    ) -> Result<(), ProcessError> {
        let gbm = Gbm::from_bytes(data)?;
        gbm.to_image()
            .save(work_dir.join(format!("{}.png", basename(target))))?;
        write_json_pretty(
            &sidecar_path(work_dir, target),
            &GbmMeta {
                color_bit: gbm.color_bit,
                unk0: gbm.unk0,
            },
        )
    }

    fn assemble(
        &self,
        target: &str,
        work_dir: &Path,
        _diag: &mut Diagnostics,
    ) -> Result<Vec<u8>, ProcessError> {
        let meta: GbmMeta = read_json(&sidecar_path(work_dir, target))?;
        let image = image::open(work_dir.join(format!("{}.png", basename(target))))?.to_rgba8();
        let gbm = Gbm::from_image(&image, meta.color_bit, meta.unk0)?;
        let mut bytes = Cursor::new(Vec::new());
        gbm.write(&mut bytes)?;
        Ok(bytes.into_inner())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct MgrEntry {
    path: String,
    unk0: u8,
    color_bit: u8,
}

/// Sprite sheets, edited as one directory of numbered PNG files per sheet
/// plus an `mgr.json` listing the sheet order and header fields.
pub struct MgrProcessor;

fn sheet_dir(work_dir: &Path, target: &str) -> PathBuf {
    let mut parts = target.rsplit('/');
    let base = parts.next().unwrap_or(target);
    let parent = parts.next().unwrap_or("");
    work_dir.join(parent).join(base)
}

impl Processor for MgrProcessor {
    fn name(&self) -> &'static str {
        "mgrproc"
    }

    fn work_dir(&self) -> &'static str {
        "mgr_sprites"
    }

    fn targets(&self) -> Vec<String> {
        let mut targets = Vec::new();
        // img0/003 and img1/013 are not present in the archive.
        let numbered: [(&str, u32, Option<u32>); 7] = [
            ("img0", 128, Some(3)),
            ("img1", 57, Some(13)),
            ("img2", 49, None),
            ("img3", 49, None),
            ("img4", 68, None),
            ("img5", 26, None),
            ("img6", 17, None),
        ];
        for (dir, count, skip) in numbered {
            for i in (0..count).filter(|i| Some(*i) != skip) {
                targets.push(format!("c/sp/{dir}/{i:03}.mgr"));
            }
        }
        targets.extend((0..9).map(|i| format!("c/par/pimg{i:02}.mgr")));
        for name in ["gmenu", "icon", "menu", "shadow", "touch", "ui", "worldmap"] {
            targets.push(format!("c/img/{name}.mgr"));
        }
        targets.push("c/map_sp/fgi_img00.mgr".to_string());
        for i in [0, 1, 2, 3, 9] {
            targets.push(format!("c/map_sp/ms_img{i:02}.mgr"));
        }
        targets
    }

    fn disassemble(
        &self,
        target: &str,
        data: &[u8],
        work_dir: &Path,
        _diag: &mut Diagnostics,
    ) -> Result<(), ProcessError> {
        let mgr = Mgr::from_bytes(data)?;
        let dir = sheet_dir(work_dir, target);
        fs::create_dir_all(&dir)?;

        let mut entries = Vec::with_capacity(mgr.images.len());
        for (index, gbm) in mgr.images.iter().enumerate() {
            let name = format!("{index}.png");
            gbm.to_image().save(dir.join(&name))?;
            entries.push(MgrEntry {
                path: name,
                unk0: gbm.unk0,
                color_bit: gbm.color_bit,
            });
        }
        serde_json::to_writer(
            BufWriter::new(fs::File::create(dir.join("mgr.json"))?),
            &entries,
        )?;
        Ok(())
    }

    fn assemble(
        &self,
        target: &str,
        work_dir: &Path,
        _diag: &mut Diagnostics,
    ) -> Result<Vec<u8>, ProcessError> {
        let dir = sheet_dir(work_dir, target);
        let entries: Vec<MgrEntry> = read_json(&dir.join("mgr.json"))?;

        let mut images = Vec::with_capacity(entries.len());
        for entry in &entries {
            let image = image::open(dir.join(&entry.path))?.to_rgba8();
            images.push(Gbm::from_image(&image, entry.color_bit, entry.unk0)?);
        }
        let mut bytes = Vec::new();
        Mgr { images }.write(&mut bytes)?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::Value;

    fn item_05_bytes() -> Vec<u8> {
        let mut element = vec![7u8, 0]; // type_id
        element.extend_from_slice(b"\x05Sword");
        element.extend_from_slice(&100u32.to_le_bytes()); // price
        element.push(0); // empty description
        element.extend_from_slice(&1u16.to_le_bytes()); // sprite_id
        element.extend_from_slice(&2u16.to_le_bytes()); // sprite_color_effect
        element.push(1); // atk_speed
        element.push(2); // class
        element.extend_from_slice(&3u16.to_le_bytes());
        element.extend_from_slice(&4u16.to_le_bytes());
        element.extend_from_slice(&5u16.to_le_bytes());
        element.extend_from_slice(&[6, 7, 8, 9, 10, 11, 12, 13, 14]);

        let mut data = vec![1u8, 0];
        data.extend_from_slice(&(element.len() as u16).to_le_bytes());
        data.extend_from_slice(&element);
        data
    }

    #[test]
    fn item_equipment_group_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut diag = Diagnostics::new();
        let data = item_05_bytes();

        ItemProcessor
            .disassemble("c/csv/item_05.dat", &data, dir.path(), &mut diag)
            .unwrap();

        let records: Vec<Document> = read_json(&dir.path().join("item_05.dat.json")).unwrap();
        assert_eq!(
            vec!["name", "desc", "price", "type_id", "extras"],
            records[0].keys().map(String::as_str).collect::<Vec<_>>()
        );
        assert_eq!(Value::from("Sword"), records[0]["name"]);
        assert_eq!(Value::from(100), records[0]["price"]);
        let extras = records[0]["extras"].as_object().unwrap();
        assert_eq!(16, extras.len());
        assert_eq!(Value::from(1), extras["atk_speed"]);
        assert_eq!(Value::from(3), extras["min_atk/phys_def"]);

        let rebuilt = ItemProcessor
            .assemble("c/csv/item_05.dat", dir.path(), &mut diag)
            .unwrap();
        assert_eq!(data, rebuilt);
        assert_eq!(0, diag.warning_count());
    }

    #[test]
    fn item_opaque_group_keeps_tail() {
        let dir = tempfile::tempdir().unwrap();
        let mut diag = Diagnostics::new();

        let mut element = vec![1u8, 0];
        element.push(0); // empty name
        element.extend_from_slice(&0u32.to_le_bytes());
        element.push(0); // empty description
        element.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF, 0x42]);
        let mut data = vec![1u8, 0];
        data.extend_from_slice(&(element.len() as u16).to_le_bytes());
        data.extend_from_slice(&element);

        ItemProcessor
            .disassemble("c/csv/item_15.dat", &data, dir.path(), &mut diag)
            .unwrap();
        let records: Vec<Document> = read_json(&dir.path().join("item_15.dat.json")).unwrap();
        assert_eq!(
            Value::from(vec![0xDEu8, 0xAD, 0xBE, 0xEF, 0x42]),
            records[0]["extras"]
        );
        assert_eq!(0, diag.warning_count());

        let rebuilt = ItemProcessor
            .assemble("c/csv/item_15.dat", dir.path(), &mut diag)
            .unwrap();
        assert_eq!(data, rebuilt);
    }

    #[test]
    fn common_text_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut diag = Diagnostics::new();
        let proc = common_text();

        let data = [2u8, 0, 3, 0, 2, b'h', b'i', 1, 0, 0];
        proc.disassemble("c/csv/tips.dat", &data, dir.path(), &mut diag)
            .unwrap();
        let texts: Vec<String> = read_json(&dir.path().join("tips.dat.json")).unwrap();
        assert_eq!(vec!["hi".to_string(), String::new()], texts);

        let rebuilt = proc.assemble("c/csv/tips.dat", dir.path(), &mut diag).unwrap();
        assert_eq!(&data[..], &rebuilt[..]);
    }

    #[test]
    fn enemy_record_is_128_bytes_after_name() {
        let mut element = vec![0u8]; // empty name
        element.extend_from_slice(&[0; 0x80]);
        let mut data = vec![1u8, 0];
        data.extend_from_slice(&(element.len() as u16).to_le_bytes());
        data.extend_from_slice(&element);

        let dir = tempfile::tempdir().unwrap();
        let mut diag = Diagnostics::new();
        enemy()
            .disassemble("c/csv/enemy_0.dat", &data, dir.path(), &mut diag)
            .unwrap();
        // No trailing bytes were left over.
        assert_eq!(0, diag.warning_count());

        let records: Vec<Document> = read_json(&dir.path().join("enemy_0.dat.json")).unwrap();
        assert_eq!(Value::from(0), records[0]["hp"]);
        assert_eq!(Value::from(0), records[0]["param_7fh"]);
    }

    #[test]
    fn gbm_processor_writes_png_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let mut diag = Diagnostics::new();

        // 2x1 image at 8 bpp, palette black and white.
        let mut data = vec![0x18, 2];
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&0x0000u16.to_le_bytes());
        data.extend_from_slice(&0xFFFFu16.to_le_bytes());
        data.extend_from_slice(&[0, 1]);

        GbmProcessor
            .disassemble("c/map/face_00.gbm", &data, dir.path(), &mut diag)
            .unwrap();
        assert!(dir.path().join("face_00.gbm.png").exists());

        let meta: GbmMeta = read_json(&dir.path().join("face_00.gbm.json")).unwrap();
        assert_eq!(8, meta.color_bit);
        assert_eq!(1, meta.unk0);

        let rebuilt = GbmProcessor
            .assemble("c/map/face_00.gbm", dir.path(), &mut diag)
            .unwrap();
        assert_eq!(data, rebuilt);
    }

    #[test]
    fn mgr_processor_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut diag = Diagnostics::new();

        let sprite = {
            let mut bytes = vec![0x08, 1];
            bytes.extend_from_slice(&1u16.to_le_bytes());
            bytes.extend_from_slice(&1u16.to_le_bytes());
            bytes.extend_from_slice(&0x001Fu16.to_le_bytes());
            bytes.push(0);
            bytes
        };
        let mut data = 1u32.to_le_bytes().to_vec();
        data.extend_from_slice(&(sprite.len() as u32).to_le_bytes());
        data.extend_from_slice(&sprite);

        MgrProcessor
            .disassemble("c/sp/img0/000.mgr", &data, dir.path(), &mut diag)
            .unwrap();
        assert!(dir.path().join("img0/000.mgr/0.png").exists());
        assert!(dir.path().join("img0/000.mgr/mgr.json").exists());

        let rebuilt = MgrProcessor
            .assemble("c/sp/img0/000.mgr", dir.path(), &mut diag)
            .unwrap();
        assert_eq!(data, rebuilt);
    }

    #[test]
    fn fixed_target_rosters() {
        assert_eq!(414, MgrProcessor.targets().len());
        assert!(!MgrProcessor.targets().contains(&"c/sp/img0/003.mgr".to_string()));
        assert!(!MgrProcessor.targets().contains(&"c/sp/img1/013.mgr".to_string()));

        assert_eq!(342, GbmProcessor.targets().len());
        assert!(!skill().targets().contains(&"c/csv/skill_04.dat".to_string()));
        assert_eq!(9, processors().len());
    }
}

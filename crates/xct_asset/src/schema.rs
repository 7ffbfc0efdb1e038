//! Table schemas: per-identity field naming.
//!
//! A schema gives names to field positions of one table identity (the
//! lowercased file stem, e.g. `tships`). Positions are either start-relative
//! (`0`, `1`, ...) or end-relative (`-1` is the last real field, before the
//! row terminator). End-relative names keep working when rows carry a
//! variable number of optional fields in the middle.
//!
//! A row only counts as a data row if it has at least
//! [`min_fields`](TableSchema::min_fields) real fields. Shorter rows, such as
//! the version/count header at the top of every table, are kept for output
//! fidelity but hidden from mutators.
//!
//! Some identities exist in two row widths, the wider one inserting extra
//! positions in the middle. Such a schema carries a wide [`FieldLayout`]; the
//! decoder switches to it at the first row wider than the base layout's
//! expected width.

use std::collections::HashMap;
use std::sync::Arc;

/// Name -> position mapping for one row width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    table: String,
    width: usize,
    names: HashMap<String, isize>,
}

impl FieldLayout {
    pub fn new(table: &str, width: usize) -> Self {
        Self {
            table: table.to_string(),
            width,
            names: HashMap::new(),
        }
    }

    /// Identity of the table this layout belongs to.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Expected number of real fields per row.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Declared position of `name`, if any.
    pub fn position(&self, name: &str) -> Option<isize> {
        self.names.get(name).copied()
    }

    /// Resolve `name` to a field index for a row with `real_width` fields.
    pub fn resolve(&self, name: &str, real_width: usize) -> Option<usize> {
        let pos = self.position(name)?;
        if pos >= 0 {
            let idx = pos as usize;
            (idx < real_width).then_some(idx)
        } else {
            real_width.checked_sub(pos.unsigned_abs())
        }
    }

    /// Iterate over `(name, position)` pairs.
    pub fn names(&self) -> impl Iterator<Item = (&str, isize)> {
        self.names.iter().map(|(name, pos)| (name.as_str(), *pos))
    }

    fn insert(&mut self, pos: isize, name: &str) {
        self.names.insert(name.to_string(), pos);
    }

    /// Copy of this layout with `inserted` names placed at `at`, shifting every
    /// start-relative position at or after `at`.
    fn with_inserted(&self, at: usize, inserted: &[&str]) -> Self {
        let shift = inserted.len() as isize;
        let at = at as isize;
        let mut names: HashMap<String, isize> = self
            .names
            .iter()
            .map(|(name, &pos)| {
                let pos = if pos >= at { pos + shift } else { pos };
                (name.clone(), pos)
            })
            .collect();
        for (i, name) in inserted.iter().enumerate() {
            names.insert(name.to_string(), at + i as isize);
        }
        Self {
            table: self.table.clone(),
            width: self.width + inserted.len(),
            names,
        }
    }
}

/// Schema of one table identity.
#[derive(Debug, Clone)]
pub struct TableSchema {
    identity: String,
    min_fields: usize,
    base: Arc<FieldLayout>,
    wide: Option<Arc<FieldLayout>>,
}

impl TableSchema {
    /// Start a schema for `identity` with base row width `width`.
    pub fn new(identity: &str, min_fields: usize, width: usize) -> Self {
        let identity = identity.to_ascii_lowercase();
        Self {
            base: Arc::new(FieldLayout::new(&identity, width)),
            identity,
            min_fields,
            wide: None,
        }
    }

    /// Name a position in the base layout.
    pub fn field(mut self, pos: isize, name: &str) -> Self {
        Arc::make_mut(&mut self.base).insert(pos, name);
        self
    }

    /// Name several consecutive start-relative positions, starting at `start`.
    pub fn fields(mut self, start: usize, names: &[&str]) -> Self {
        let layout = Arc::make_mut(&mut self.base);
        for (i, name) in names.iter().enumerate() {
            layout.insert((start + i) as isize, name);
        }
        self
    }

    /// Declare the wide row variant: the base layout with `inserted` names at `at`.
    ///
    /// Call this after all base fields are declared.
    pub fn with_wide_variant(mut self, at: usize, inserted: &[&str]) -> Self {
        self.wide = Some(Arc::new(self.base.with_inserted(at, inserted)));
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn min_fields(&self) -> usize {
        self.min_fields
    }

    pub fn base(&self) -> &Arc<FieldLayout> {
        &self.base
    }

    pub fn wide(&self) -> Option<&Arc<FieldLayout>> {
        self.wide.as_ref()
    }
}

/// Schemas keyed by table identity. Owned by the run context.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<TableSchema>>,
}

impl SchemaRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in table schemas.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for schema in builtin_schemas() {
            registry.register(schema);
        }
        registry
    }

    /// Add or replace a schema.
    pub fn register(&mut self, schema: TableSchema) {
        self.schemas
            .insert(schema.identity.clone(), Arc::new(schema));
    }

    /// Case-insensitive schema lookup.
    pub fn get(&self, identity: &str) -> Option<Arc<TableSchema>> {
        self.schemas.get(&identity.to_ascii_lowercase()).cloned()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

fn builtin_schemas() -> Vec<TableSchema> {
    const MODEL: &[&str] = &[
        "model",
        "picture_id",
        "rotation_x",
        "rotation_y",
        "rotation_z",
        "index_name",
    ];

    vec![
        TableSchema::new("tships", 40, 62)
            .fields(
                0,
                &[
                    "body_file",
                    "picture_id",
                    "yaw",
                    "pitch",
                    "roll",
                    "ship_class",
                    "description_id",
                    "speed",
                    "acceleration",
                    "engine_sound",
                    "reaction_delay",
                    "engine_effect",
                    "engine_glow",
                    "power",
                    "sound_approach",
                    "sound_engine",
                    "model_scene",
                    "cockpit_scene",
                    "laser_mask",
                    "gun_count",
                    "laser_energy",
                    "laser_recharge_rate",
                    "shield_type",
                    "max_shields",
                    "missile_mask",
                    "missile_count",
                    "speed_extensions",
                    "steering_extensions",
                    "cargo_min",
                    "cargo_max",
                    "ware_list",
                ],
            )
            .field(-3, "size_class")
            .field(-2, "relative_value_npc")
            .field(-1, "ship_id"),
        TableSchema::new("tlaser", 20, 27)
            .fields(0, MODEL)
            .fields(
                6,
                &[
                    "reload_rate",
                    "bullet_type",
                    "sound_effect",
                    "use_sound",
                    "rotation_speed",
                    "rotation_acceleration",
                    "energy_use",
                ],
            )
            .field(-2, "name_id")
            .field(-1, "laser_id"),
        TableSchema::new("tbullets", 30, 37)
            .fields(0, MODEL)
            .fields(
                6,
                &[
                    "hull_damage",
                    "shield_damage",
                    "speed",
                    "flags",
                    "color_r",
                    "color_g",
                    "color_b",
                    "glow_size",
                    "lifetime",
                    "impact_effect",
                    "energy_used",
                    "sound",
                    "trail_effect",
                    "impact_sound",
                    "launch_effect",
                    "engine_trail",
                ],
            )
            .field(-2, "name_id")
            .field(-1, "bullet_id")
            .with_wide_variant(
                21,
                &[
                    "ammunition_type",
                    "ammunition_reload_time",
                    "ammunition_rounds",
                    "ammunition_unused",
                ],
            ),
        TableSchema::new("tmissiles", 30, 43)
            .fields(0, MODEL)
            .fields(
                6,
                &[
                    "speed",
                    "acceleration",
                    "damage",
                    "range",
                    "flags",
                    "reload_time",
                    "sound",
                    "glow_effect",
                    "trail_effect",
                    "blast_radius",
                ],
            )
            .field(-2, "name_id")
            .field(-1, "missile_id"),
        TableSchema::new("tshields", 12, 16)
            .fields(0, MODEL)
            .fields(6, &["recharge_rate", "strength", "power_drain"])
            .field(-2, "name_id")
            .field(-1, "shield_id"),
    ]
}

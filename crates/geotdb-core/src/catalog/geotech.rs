//! The built-in geotechnical schema.
//!
//! ```text
//! CLIENT
//! COMPANY
//! └── PROJECT ··· CLIENT_ID → CLIENT (SET NULL on delete)
//!     └── POINT (FINAL_DEPTH bounds every interval below)
//!         ├── CONSTRUCTION, GEOLOGY, ..., SPT, LFWD   [TOP]
//!         └── SAMPLE                                  [TYPE, REF, TOP]
//!             └── SPECIMEN                            [TOP, REF]
//!                 ├── PLI, CBR                        [TYPE]
//!                 ├── UCS, WATER_CONTENT, ATTERBERG_LIMITS, AGGRESSIVITY
//!                 └── GRADING_SUMMARY
//!                     └── GRADING_DATA                [SIZE_mm]
//! ```

use super::field::ColumnDef;
use super::level::LevelDef;
use super::relation::ReferenceDef;
use super::schema::SchemaDescription;
use super::types::ScalarType;

/// Precision of every depth column.
const DEPTH_SCALE: u8 = 2;

fn text(name: &str) -> ColumnDef {
    ColumnDef::new(name, ScalarType::String)
}

fn opt_text(name: &str) -> ColumnDef {
    ColumnDef::optional(name, ScalarType::String)
}

fn opt_int(name: &str) -> ColumnDef {
    ColumnDef::optional(name, ScalarType::Integer)
}

fn num(name: &str, scale: u8) -> ColumnDef {
    ColumnDef::new(name, ScalarType::decimal(scale))
}

fn opt_num(name: &str, scale: u8) -> ColumnDef {
    ColumnDef::optional(name, ScalarType::decimal(scale))
}

fn flag(name: &str) -> ColumnDef {
    ColumnDef::new(name, ScalarType::Boolean).with_default(false)
}

/// A TOP/BTM level owned by `parent`, keyed by its own TOP.
fn interval(name: &str, parent: &str) -> LevelDef {
    LevelDef::child_of(name, parent)
        .with_key(num("TOP", DEPTH_SCALE))
        .with_attribute(opt_num("BTM", DEPTH_SCALE))
        .with_depth_interval("TOP", Some("BTM"))
}

/// A MIN/MAX descriptive interval below a point.
fn range_interval(name: &str) -> LevelDef {
    interval(name, "POINT").with_attributes([text("MIN"), opt_text("MAX")])
}

/// Description of the geotechnical hierarchy.
pub fn geotechnical_schema() -> SchemaDescription {
    SchemaDescription::new()
        // Metadata
        .with_level(LevelDef::new("COMPANY").with_key(text("COMPANY_ID")))
        .with_level(LevelDef::new("CLIENT").with_key(text("CLIENT_ID")))
        .with_level(
            LevelDef::child_of("PROJECT", "COMPANY")
                .with_key(text("PROJECT_ID"))
                .with_attributes([
                    text("NAME"),
                    opt_text("CLIENT_ID"),
                    opt_text("LOCATION"),
                    opt_text("DATUM_VERTICAL"),
                    opt_text("DATUM_HORIZONTAL"),
                    opt_text("DATUM_HORIZONTAL_ZONE"),
                ])
                .with_reference(ReferenceDef::optional("project_client", "CLIENT_ID", "CLIENT")),
        )
        .with_level(
            LevelDef::child_of("POINT", "PROJECT")
                .with_key(text("POINT_ID"))
                .with_attributes([
                    text("TYPE"),
                    opt_text("LOGGED_BY"),
                    opt_text("CHECKED_BY"),
                    opt_text("STATUS"),
                    ColumnDef::optional("DATE_START", ScalarType::Date),
                    ColumnDef::optional("DATE_END", ScalarType::Date),
                    opt_text("LOCATION"),
                    opt_text("TERMINATION_REMARK"),
                    opt_num("FINAL_DEPTH", DEPTH_SCALE),
                    opt_num("X_EASTING", 3),
                    opt_num("Y_NORTHING", 3),
                    opt_num("Z_ELEVATION", 3),
                    opt_num("WGS84_LAT", 8),
                    opt_num("WGS84_LNG", 8),
                    opt_num("INCLINATION", 1).with_default(90i64),
                    opt_text("CREW"),
                    opt_text("MACHINE"),
                    opt_num("PIT_LENGTH", 2),
                    opt_num("PIT_WIDTH", 2),
                    opt_int("PAGE_DEPTH").with_default(6i64),
                ])
                .with_depth_limit("FINAL_DEPTH"),
        )
        // Field logging
        .with_level(interval("CONSTRUCTION", "POINT").with_attribute(text("METHOD")))
        .with_level(interval("GEOLOGY", "POINT").with_attributes([
            text("LEGEND"),
            opt_text("USCS_SYMBOL"),
            opt_text("ORIGIN"),
            opt_text("MATERIAL"),
            opt_text("COLOUR"),
            opt_text("DESCRIPTION"),
            opt_text("MOISTURE"),
        ]))
        .with_level(interval("DEPTH_REMARKS", "POINT").with_attribute(text("REMARK")))
        .with_level(range_interval("SOIL_STRENGTH"))
        .with_level(interval("ROCK_CORE", "POINT").with_attributes([
            opt_int("TOTAL_CORE_RECOVERY"),
            opt_int("ROCK_QUALITY_DESIGNATION"),
        ]))
        .with_level(range_interval("ROCK_WEATHERING"))
        .with_level(range_interval("ROCK_STRENGTH"))
        .with_level(interval("ROCK_DISC", "POINT").with_attributes([
            opt_text("TYPE"),
            opt_text("SUFFIX"),
            opt_text("DIP_MIN"),
            opt_text("DIP_MAX"),
            opt_text("PLANARITY"),
            opt_text("ROUGHNESS"),
            opt_text("APERTURE_OBSERVATION"),
            opt_text("INFILL"),
            opt_int("APERTURE_MIN"),
            opt_int("APERTURE_MAX"),
            opt_text("REMARKS"),
            opt_text("OVERRIDE"),
        ]))
        .with_level(range_interval("ROCK_DISC_SPACING"))
        // Field testing
        .with_level(interval("SPT", "POINT").with_attributes([
            text("BLOWS_SEAT"),
            opt_text("BLOWS_TEST1"),
            opt_text("BLOWS_TEST2"),
            flag("HAMMER_BOUNCE"),
            ColumnDef::new("PEN_SEAT", ScalarType::Integer),
            opt_int("PEN_TEST1"),
            opt_int("PEN_TEST2"),
            opt_int("N"),
            opt_int("N_INTERP"),
            opt_text("REMARK"),
            opt_text("REPORT"),
        ]))
        .with_level(
            LevelDef::child_of("LFWD", "POINT")
                .with_key(num("TOP", DEPTH_SCALE))
                .with_attributes([num("MODULUS_MPa", 1), opt_num("STRESS_kPa", 1)])
                .with_depth_interval("TOP", None),
        )
        // Samples and specimens
        .with_level(
            LevelDef::child_of("SAMPLE", "POINT")
                .with_key(text("TYPE"))
                .with_key(text("REF"))
                .with_key(num("TOP", DEPTH_SCALE))
                .with_attribute(opt_num("BTM", DEPTH_SCALE))
                .with_depth_interval("TOP", Some("BTM")),
        )
        .with_level(
            LevelDef::child_of("SPECIMEN", "SAMPLE")
                .with_key(num("TOP", DEPTH_SCALE))
                .with_key(text("REF"))
                .with_attribute(opt_num("BTM", DEPTH_SCALE))
                .with_depth_interval("TOP", Some("BTM")),
        )
        // Laboratory testing
        .with_level(
            LevelDef::child_of("PLI", "SPECIMEN")
                .with_key(text("TYPE"))
                .with_attributes([num("IS50_MPa", 2), flag("DEFECT")]),
        )
        .with_level(LevelDef::child_of("UCS", "SPECIMEN").with_attributes([
            num("UCS_MPa", 2),
            opt_num("MODULUS_SECANT_GPa", 2),
            opt_num("MODULUS_TANGENT_GPa", 2),
            flag("DEFECT"),
        ]))
        .with_level(
            LevelDef::child_of("WATER_CONTENT", "SPECIMEN")
                .with_attributes([opt_num("MC", 1), opt_num("MC_VOLUMETRIC", 1)]),
        )
        .with_level(LevelDef::child_of("ATTERBERG_LIMITS", "SPECIMEN").with_attributes([
            opt_num("LL", 1),
            opt_num("PL", 1),
            opt_num("PI", 1),
            opt_num("LS", 1),
        ]))
        .with_level(LevelDef::child_of("GRADING_SUMMARY", "SPECIMEN").with_attributes([
            opt_int("PERC_OVERSIZE"),
            opt_int("PERC_GRAVEL"),
            opt_int("PERC_SAND"),
            opt_int("PERC_FINES"),
            opt_int("PERC_SILT"),
            opt_int("PERC_CLAY"),
        ]))
        .with_level(
            LevelDef::child_of("GRADING_DATA", "GRADING_SUMMARY")
                .with_key(num("SIZE_mm", 3))
                .with_attribute(ColumnDef::new("PERC_PASSING", ScalarType::Integer)),
        )
        .with_level(
            LevelDef::child_of("CBR", "SPECIMEN")
                .with_key(text("TYPE"))
                .with_attributes([num("CBR", 1), opt_num("SWELL", 1)]),
        )
        .with_level(LevelDef::child_of("AGGRESSIVITY", "SPECIMEN").with_attributes([
            opt_num("pH", 1),
            opt_int("SO4_ppm"),
            opt_int("Cl_ppm"),
            opt_int("CONDUCTIVITY_μS_cm"),
            opt_int("SOLUBLE_SALTS_ppm"),
        ]))
}

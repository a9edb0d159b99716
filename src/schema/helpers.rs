//! Pure shape functions over record types.

use super::SchemaRegistry;
use crate::models::{FieldKind, ID_FIELD, RecordType};
use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum sheet name length accepted by spreadsheet formats.
const MAX_SHEET_NAME_LEN: usize = 31;

/// Stem of a generated single-type export file name.
static EXPORT_STEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+)-(?:export|selected-\d+)-\d{4}-\d{2}-\d{2}$")
        .unwrap_or_else(|_| unreachable!("export stem pattern is valid"))
});

/// Splits a column name into `(component, sub_field)` if it addresses a
/// single component's sub-field.
///
/// A column qualifies when it is not itself a field of the record type and
/// some separator splits it into a non-repeatable component field and a
/// sub-field. A sub-field containing the separator must be declared on the
/// component type; one without it is accepted as is.
#[must_use]
pub fn component_column<'a>(
    key: &'a str,
    record_type: &RecordType,
    registry: &dyn SchemaRegistry,
    separator: char,
) -> Option<(&'a str, &'a str)> {
    if record_type.has_field(key) {
        return None;
    }
    key.match_indices(separator).find_map(|(at, sep)| {
        let (component, sub_field) = (&key[..at], &key[at + sep.len()..]);
        if component.is_empty() || sub_field.is_empty() {
            return None;
        }
        let spec = record_type
            .field(component)
            .filter(|spec| spec.is_component() && !spec.is_many())?;
        let declared = spec
            .target
            .as_deref()
            .and_then(|target| registry.get_record_type(target))
            .is_some_and(|component_type| component_type.has_field(sub_field));
        (declared || !sub_field.contains(separator)).then_some((component, sub_field))
    })
}

/// Fields searched with case-insensitive containment by free-text search.
#[must_use]
pub fn searchable_fields(record_type: &RecordType) -> Vec<String> {
    record_type
        .fields_of_kind(FieldKind::Primitive)
        .filter(|(name, spec)| *name != "locale" && spec.data_type().is_text_like())
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Fields searched by equality when a free-text query is numeric. Always
/// ends with the identifier.
#[must_use]
pub fn numeric_fields(record_type: &RecordType) -> Vec<String> {
    let mut fields: Vec<String> = record_type
        .fields_of_kind(FieldKind::Primitive)
        .filter(|(_, spec)| spec.data_type().is_numeric())
        .map(|(name, _)| name.to_string())
        .collect();
    fields.push(ID_FIELD.to_string());
    fields
}

/// Derives a sheet name from a record type identifier.
///
/// Takes the last `.` segment, replaces characters other than word
/// characters, whitespace and `-` with `_`, and truncates to 31 characters.
#[must_use]
pub fn sheet_name(record_type_id: &str) -> String {
    let last = record_type_id.rsplit('.').next().unwrap_or(record_type_id);
    last.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c.is_whitespace() {
                c
            } else {
                '_'
            }
        })
        .take(MAX_SHEET_NAME_LEN)
        .collect()
}

/// Maps a sheet name (or CSV file stem) back to a record type identifier.
///
/// Among user content types, in order:
/// 1. the type whose [`sheet_name`] equals the sheet;
/// 2. for a generated export stem (`<type>-export-<date>` or
///    `<type>-selected-<n>-<date>`), the type whose id without `namespace`,
///    or whose sheet name, equals `<type>`;
/// 3. the type with the longest sheet name the sheet ends with after a
///    `-`, as written for multi-sheet CSV exports (`<stem>-<sheet>`).
///
/// Falls back to `<namespace><sheet>.<sheet>`.
#[must_use]
pub fn record_type_for_sheet(
    registry: &dyn SchemaRegistry,
    sheet: &str,
    namespace: &str,
) -> String {
    let user_types: Vec<&RecordType> = registry
        .list_record_types()
        .into_iter()
        .filter(|rt| is_user_content(&rt.id, namespace))
        .collect();

    if let Some(rt) = user_types.iter().find(|rt| sheet_name(&rt.id) == sheet) {
        return rt.id.clone();
    }

    if let Some(base) = EXPORT_STEM.captures(sheet).and_then(|c| c.get(1)) {
        let base = base.as_str();
        if let Some(rt) = user_types
            .iter()
            .find(|rt| rt.id.strip_prefix(namespace) == Some(base) || sheet_name(&rt.id) == base)
        {
            return rt.id.clone();
        }
    }

    user_types
        .iter()
        .map(|rt| (rt, sheet_name(&rt.id)))
        .filter(|(_, name)| {
            sheet
                .strip_suffix(name.as_str())
                .is_some_and(|rest| rest.len() > 1 && rest.ends_with('-'))
        })
        .max_by_key(|(_, name)| name.len())
        .map_or_else(|| format!("{namespace}{sheet}.{sheet}"), |(rt, _)| rt.id.clone())
}

/// Returns whether a record type holds user content (as opposed to
/// components or host-internal types).
#[must_use]
pub fn is_user_content(record_type_id: &str, namespace: &str) -> bool {
    record_type_id.starts_with(namespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cardinality, DataType, FieldSpec};
    use crate::schema::StaticSchemaRegistry;
    use test_case::test_case;

    fn company() -> RecordType {
        RecordType::new("api::company.company")
            .with_field("name", FieldSpec::primitive(DataType::String))
            .with_field("ticker_code", FieldSpec::primitive(DataType::String))
            .with_field("employees", FieldSpec::primitive(DataType::Integer))
            .with_field("locale", FieldSpec::primitive(DataType::String))
            .with_field("address", FieldSpec::component("shared.address", Cardinality::One))
            .with_field("offices", FieldSpec::component("shared.address", Cardinality::Many))
    }

    fn registry() -> StaticSchemaRegistry {
        StaticSchemaRegistry::new(vec![
            company().with_field(
                "home_address",
                FieldSpec::component("shared.address", Cardinality::One),
            ),
            RecordType::new("shared.address")
                .with_field("city", FieldSpec::primitive(DataType::String))
                .with_field("zip_code", FieldSpec::primitive(DataType::String)),
        ])
        .unwrap()
    }

    #[test_case("address_city", Some(("address", "city")) ; "component sub-field")]
    #[test_case("address_zip_code", Some(("address", "zip_code")) ; "declared sub-field containing separator")]
    #[test_case("home_address_zip_code", Some(("home_address", "zip_code")) ; "component containing separator")]
    #[test_case("address_street", Some(("address", "street")) ; "undeclared sub-field")]
    #[test_case("ticker_code", None ; "field name containing separator")]
    #[test_case("address_city_name", None ; "undeclared sub-field containing separator")]
    #[test_case("offices_city", None ; "repeatable component")]
    #[test_case("other_city", None ; "unknown prefix")]
    #[test_case("address_", None ; "empty sub-field")]
    fn test_component_column(key: &str, expected: Option<(&str, &str)>) {
        let registry = registry();
        let rt = registry.require("api::company.company").unwrap();
        assert_eq!(component_column(key, rt, &registry, '_'), expected);
    }

    #[test]
    fn test_search_field_lists() {
        let rt = company();
        assert_eq!(searchable_fields(&rt), vec!["name", "ticker_code"]);
        assert_eq!(numeric_fields(&rt), vec!["employees", "id"]);
    }

    #[test_case("api::company.company", "company")]
    #[test_case("api::a.with space", "with space")]
    #[test_case("api::x.na:me", "na_me")]
    #[test_case("plain", "plain")]
    fn test_sheet_name(id: &str, expected: &str) {
        assert_eq!(sheet_name(id), expected);
    }

    #[test]
    fn test_sheet_name_truncates() {
        let long = format!("api::x.{}", "a".repeat(40));
        assert_eq!(sheet_name(&long).len(), 31);
    }

    #[test]
    fn test_record_type_for_sheet() {
        let registry = StaticSchemaRegistry::new(vec![
            RecordType::new("api::company.organisation"),
        ])
        .unwrap();
        assert_eq!(
            record_type_for_sheet(&registry, "organisation", "api::"),
            "api::company.organisation"
        );
        assert_eq!(
            record_type_for_sheet(&registry, "person", "api::"),
            "api::person.person"
        );
    }

    #[test_case("company", "api::company.company" ; "sheet name")]
    #[test_case("company.company-export-2026-10-18", "api::company.company" ; "single type export")]
    #[test_case("company.company-selected-3-2026-10-18", "api::company.company" ; "selection export")]
    #[test_case("company-export-2026-10-18", "api::company.company" ; "export named by sheet")]
    #[test_case("records-export-2026-10-18-company", "api::company.company" ; "multi-sheet export")]
    #[test_case("records-export-2026-10-18-sub-company", "api::sub-company.sub-company" ; "longest sheet suffix wins")]
    #[test_case("backup-person", "api::person.person" ; "user stem with sheet suffix")]
    #[test_case("-company", "api::-company.-company" ; "bare separator")]
    #[test_case("notes-export-2026-10-18", "api::notes-export-2026-10-18.notes-export-2026-10-18" ; "unknown export stem")]
    fn test_record_type_for_file_stem(stem: &str, expected: &str) {
        let registry = StaticSchemaRegistry::new(vec![
            RecordType::new("api::company.company"),
            RecordType::new("api::sub-company.sub-company"),
            RecordType::new("api::person.person"),
            RecordType::new("shared.company"),
        ])
        .unwrap();
        assert_eq!(record_type_for_sheet(&registry, stem, "api::"), expected);
    }
}

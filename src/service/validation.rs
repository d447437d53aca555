//! Request body validation against entity field definitions.
//!
//! Produces the normalized values to write, in field declaration order. Every violation
//! found is collected; the request fails with one validation error listing all of them.

use crate::error::{AppError, FieldErrors};
use crate::schema::{EntityDef, FieldDef, FieldKind};
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::OnceLock;

const REQUIRED: &str = "This field is required.";
const NOT_NULL: &str = "This field may not be null.";
const NOT_BLANK: &str = "This field may not be blank.";
const I32_MAX: i64 = i32::MAX as i64;
const I32_MIN: i64 = i32::MIN as i64;

/// How absent fields are treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    /// POST: required fields must be present; absent optional fields take their default.
    Create,
    /// PUT: required fields must be present; absent optional fields keep their stored value.
    Full,
    /// PATCH: only the fields present are validated and written.
    Partial,
}

pub type WriteSet<'e> = Vec<(&'e FieldDef, Value)>;

pub struct RequestValidator;

impl RequestValidator {
    /// Validate `body` for `entity`. Server-managed and unknown keys are ignored.
    pub fn validate<'e>(
        entity: &'e EntityDef,
        body: &Map<String, Value>,
        mode: WriteMode,
    ) -> Result<WriteSet<'e>, AppError> {
        let mut errors = FieldErrors::default();
        let mut out = Vec::new();
        for f in entity.writable_fields() {
            match body.get(f.name) {
                None => {
                    if mode == WriteMode::Partial {
                        continue;
                    }
                    if f.required() {
                        errors.add(f.name, REQUIRED);
                    } else if mode == WriteMode::Full {
                        continue;
                    } else if let FieldKind::Choice { default, .. } = f.kind {
                        out.push((f, Value::from(default)));
                    } else {
                        out.push((f, Value::Null));
                    }
                }
                Some(Value::Null) => {
                    if f.nullable {
                        out.push((f, Value::Null));
                    } else {
                        errors.add(f.name, NOT_NULL);
                    }
                }
                Some(v) => match validate_field(f, v) {
                    Ok(normalized) => out.push((f, normalized)),
                    Err(msgs) => {
                        for m in msgs {
                            errors.add(f.name, m);
                        }
                    }
                },
            }
        }
        errors.into_result()?;
        Ok(out)
    }
}

/// Check one non-null value; returns the normalized value or the messages for this field.
fn validate_field(f: &FieldDef, v: &Value) -> Result<Value, Vec<String>> {
    match &f.kind {
        FieldKind::Text { max_length } => {
            let s = as_text(v)?;
            check_text(f, &s, *max_length)?;
            Ok(Value::String(s))
        }
        FieldKind::Email { max_length } => {
            let s = as_text(v)?;
            check_text(f, &s, Some(*max_length))?;
            if !s.is_empty() && !is_email(&s) {
                return Err(vec!["Enter a valid email address.".into()]);
            }
            Ok(Value::String(s))
        }
        FieldKind::Integer { min, max } => {
            let n = as_integer(v).ok_or_else(|| vec!["A valid integer is required.".to_string()])?;
            let mut msgs = Vec::new();
            let lower = min.unwrap_or(I32_MIN).max(I32_MIN);
            let upper = max.unwrap_or(I32_MAX).min(I32_MAX);
            if n < lower {
                msgs.push(format!("Ensure this value is greater than or equal to {}.", lower));
            }
            if n > upper {
                msgs.push(format!("Ensure this value is less than or equal to {}.", upper));
            }
            if msgs.is_empty() {
                Ok(Value::from(n))
            } else {
                Err(msgs)
            }
        }
        FieldKind::Choice { choices, .. } => {
            let n = as_integer(v).filter(|n| choices.iter().any(|(c, _)| c == n));
            n.map(Value::from)
                .ok_or_else(|| vec![format!("\"{}\" is not a valid choice.", display(v))])
        }
        FieldKind::Decimal {
            max_digits,
            decimal_places,
        } => validate_decimal(v, *max_digits, *decimal_places),
        FieldKind::DateTime => {
            let s = v
                .as_str()
                .and_then(parse_datetime)
                .ok_or_else(|| {
                    vec!["Datetime has wrong format. Use one of these formats instead: \
                          YYYY-MM-DDThh:mm[:ss[.uuuuuu]][+HH:MM|-HH:MM|Z]."
                        .to_string()]
                })?;
            Ok(Value::String(s.to_rfc3339()))
        }
        FieldKind::Boolean => v
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| vec!["Must be a valid boolean.".to_string()]),
        FieldKind::ForeignKey { .. } | FieldKind::BigId => match as_integer(v) {
            Some(n) if n > 0 => Ok(Value::from(n)),
            Some(n) => Err(vec![format!("Invalid pk \"{}\" - object does not exist.", n)]),
            None => Err(vec![format!(
                "Incorrect type. Expected pk value, received {}.",
                json_type_name(v)
            )]),
        },
    }
}

fn as_text(v: &Value) -> Result<String, Vec<String>> {
    match v {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(vec!["Not a valid string.".to_string()]),
    }
}

fn check_text(f: &FieldDef, s: &str, max_length: Option<u32>) -> Result<(), Vec<String>> {
    if s.is_empty() && !f.nullable {
        return Err(vec![NOT_BLANK.to_string()]);
    }
    if let Some(max) = max_length {
        if s.chars().count() > max as usize {
            return Err(vec![format!(
                "Ensure this field has no more than {} characters.",
                max
            )]);
        }
    }
    Ok(())
}

/// Integers from JSON numbers (including `12.0`) or numeric strings.
fn as_integer(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn validate_decimal(v: &Value, max_digits: u32, decimal_places: u32) -> Result<Value, Vec<String>> {
    let raw = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return Err(vec!["A valid number is required.".to_string()]),
    };
    let d = Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| vec!["A valid number is required.".to_string()])?
        .normalize();
    let mut msgs = Vec::new();
    if d.scale() > decimal_places {
        msgs.push(format!(
            "Ensure that there are no more than {} decimal places.",
            decimal_places
        ));
    }
    let whole = d.abs().trunc();
    let whole_digits = if whole.is_zero() {
        0
    } else {
        whole.to_string().len() as u32
    };
    let max_whole = max_digits - decimal_places;
    if whole_digits > max_whole {
        msgs.push(format!(
            "Ensure that there are no more than {} digits before the decimal point.",
            max_whole
        ));
    }
    if !msgs.is_empty() {
        return Err(msgs);
    }
    let mut fixed = d;
    fixed.rescale(decimal_places);
    Ok(Value::String(fixed.to_string()))
}

/// RFC 3339, or a naive `YYYY-MM-DDThh:mm[:ss]` taken as UTC.
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn is_email(s: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
        .map_or_else(|| s.contains('@'), |re| re.is_match(s))
}

fn display(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::entities;
    use serde_json::json;

    fn body(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("test body must be an object"),
        }
    }

    fn vehicle_body(year: Value, km: Value) -> Map<String, Value> {
        body(json!({
            "year": year,
            "color": "Red",
            "license_plate": "ABC1D23",
            "km": km,
            "customer": 1,
            "car_model": 1
        }))
    }

    fn field_errors(r: Result<WriteSet<'_>, AppError>) -> FieldErrors {
        match r {
            Err(AppError::Validation(e)) => e,
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("expected validation error"),
        }
    }

    #[test]
    fn missing_required_fields_are_all_reported() {
        let customer = entities::customer();
        let errors = field_errors(RequestValidator::validate(
            &customer,
            &body(json!({"name": "Ana"})),
            WriteMode::Create,
        ));
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["cpf", "email"]);
        assert_eq!(errors.get("email").unwrap(), &[REQUIRED.to_string()]);
    }

    #[test]
    fn vehicle_year_bounds_are_inclusive() {
        let vehicle = entities::vehicle();
        for year in [1500, 9999] {
            assert!(RequestValidator::validate(&vehicle, &vehicle_body(json!(year), json!(10)), WriteMode::Full).is_ok());
        }
        for year in [1499, 10000] {
            let errors = field_errors(RequestValidator::validate(
                &vehicle,
                &vehicle_body(json!(year), json!(10)),
                WriteMode::Full,
            ));
            assert!(errors.get("year").is_some(), "year {year} should be rejected");
        }
    }

    #[test]
    fn odometer_must_not_be_negative() {
        let vehicle = entities::vehicle();
        assert!(RequestValidator::validate(&vehicle, &vehicle_body(json!(2020), json!(0)), WriteMode::Full).is_ok());
        let errors = field_errors(RequestValidator::validate(
            &vehicle,
            &vehicle_body(json!(2020), json!(-1)),
            WriteMode::Full,
        ));
        assert_eq!(
            errors.get("km").unwrap(),
            &["Ensure this value is greater than or equal to 0.".to_string()]
        );
    }

    #[test]
    fn choice_defaults_apply_on_create() {
        let vehicle = entities::vehicle();
        let values =
            RequestValidator::validate(&vehicle, &vehicle_body(json!(2020), json!(5)), WriteMode::Create).unwrap();
        let ty = values.iter().find(|(f, _)| f.name == "type").unwrap();
        assert_eq!(ty.1, json!(1));
    }

    #[test]
    fn full_update_leaves_absent_optional_fields_alone() {
        let service = entities::service();
        let b = body(json!({
            "value": "120.00",
            "delivery_deadline": "2030-01-20T12:00:00Z",
            "start_date": "2030-01-01T08:00:00Z",
            "end_date": "2030-01-02T18:00:00Z",
            "description": "Troca de óleo",
            "vehicle": 1
        }));
        let values = RequestValidator::validate(&service, &b, WriteMode::Full).unwrap();
        assert!(values.iter().all(|(f, _)| f.name != "status"));
        let values = RequestValidator::validate(&service, &b, WriteMode::Create).unwrap();
        assert!(values.iter().any(|(f, v)| f.name == "status" && *v == json!(1)));

        let address = entities::address();
        let b = body(json!({
            "cep": "01001000",
            "street": "Praça da Sé",
            "neighborhood": "Sé",
            "house_number": 1,
            "complement": "Lado ímpar",
            "reference": "Catedral"
        }));
        let values = RequestValidator::validate(&address, &b, WriteMode::Full).unwrap();
        assert!(values.iter().all(|(f, _)| f.name != "city"));

        let mut b = b;
        b.remove("street");
        let errors = field_errors(RequestValidator::validate(&address, &b, WriteMode::Full));
        assert_eq!(errors.get("street").unwrap(), &[REQUIRED.to_string()]);
    }

    #[test]
    fn license_plate_longer_than_seven_is_rejected() {
        let vehicle = entities::vehicle();
        let mut b = vehicle_body(json!(2020), json!(5));
        b.insert("license_plate".into(), json!("ABCD1234"));
        let errors = field_errors(RequestValidator::validate(&vehicle, &b, WriteMode::Full));
        assert!(errors.get("license_plate").is_some());
    }

    #[test]
    fn money_is_normalized_to_two_places() {
        let payment = entities::payment();
        let values = RequestValidator::validate(
            &payment,
            &body(json!({"discount": 0, "total": "150.5", "service": 1, "method": "2"})),
            WriteMode::Full,
        )
        .unwrap();
        let by_name = |n: &str| values.iter().find(|(f, _)| f.name == n).unwrap().1.clone();
        assert_eq!(by_name("discount"), json!("0.00"));
        assert_eq!(by_name("total"), json!("150.50"));
        assert_eq!(by_name("method"), json!(2));
    }

    #[test]
    fn money_with_three_places_or_too_many_digits_is_rejected() {
        let employer = entities::employer();
        let errors = field_errors(RequestValidator::validate(
            &employer,
            &body(json!({"salary": "1000.123"})),
            WriteMode::Partial,
        ));
        let msgs = errors.get("salary").unwrap();
        assert_eq!(msgs.len(), 2);
        assert!(msgs[0].contains("decimal places"));
        assert!(msgs[1].contains("3 digits before the decimal point"));
    }

    #[test]
    fn partial_update_checks_only_present_fields() {
        let customer = entities::customer();
        let values = RequestValidator::validate(
            &customer,
            &body(json!({"email": "ana@example.com"})),
            WriteMode::Partial,
        )
        .unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].0.name, "email");
    }

    #[test]
    fn server_managed_and_unknown_keys_are_ignored() {
        let brand = entities::brand();
        let values = RequestValidator::validate(
            &brand,
            &body(json!({
                "id": 99,
                "created_at": "2000-01-01T00:00:00Z",
                "active": false,
                "name": "Fiat",
                "nickname": "x"
            })),
            WriteMode::Full,
        )
        .unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].1, json!("Fiat"));
    }

    #[test]
    fn optional_text_accepts_null_and_blank() {
        let address = entities::address();
        let mut b = body(json!({
            "cep": "01001000",
            "street": "Praça da Sé",
            "city": null,
            "neighborhood": "Sé",
            "house_number": 1,
            "complement": "Lado ímpar",
            "reference": "Catedral"
        }));
        assert!(RequestValidator::validate(&address, &b, WriteMode::Full).is_ok());
        b.insert("city".into(), json!(""));
        assert!(RequestValidator::validate(&address, &b, WriteMode::Full).is_ok());
        b.insert("street".into(), json!("   "));
        let errors = field_errors(RequestValidator::validate(&address, &b, WriteMode::Full));
        assert_eq!(errors.get("street").unwrap(), &[NOT_BLANK.to_string()]);
    }

    #[test]
    fn invalid_email_choice_and_datetime() {
        let service = entities::service();
        let errors = field_errors(RequestValidator::validate(
            &service,
            &body(json!({"status": 7, "start_date": "tomorrow", "vehicle": "abc"})),
            WriteMode::Partial,
        ));
        assert_eq!(errors.get("status").unwrap(), &["\"7\" is not a valid choice.".to_string()]);
        assert!(errors.get("start_date").is_some());
        assert!(errors.get("vehicle").is_some());

        let customer = entities::customer();
        let errors = field_errors(RequestValidator::validate(
            &customer,
            &body(json!({"email": "not-an-email"})),
            WriteMode::Partial,
        ));
        assert_eq!(errors.get("email").unwrap(), &["Enter a valid email address.".to_string()]);
    }

    #[test]
    fn datetimes_are_normalized_to_utc() {
        let service = entities::service();
        let values = RequestValidator::validate(
            &service,
            &body(json!({"delivery_deadline": "2024-06-01T12:00:00-03:00"})),
            WriteMode::Partial,
        )
        .unwrap();
        assert_eq!(values[0].1, json!("2024-06-01T15:00:00+00:00"));
    }
}

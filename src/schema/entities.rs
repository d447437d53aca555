//! The workshop's entities and their filter sets.

use crate::filter::{FilterDef, Lookup};
use crate::schema::types::{EntityDef, FieldDef, OnDelete};

pub const VEHICLE_TYPES: &[(i64, &str)] = &[(1, "Car"), (2, "Motorcycle"), (3, "Truck")];

pub const SERVICE_STATUSES: &[(i64, &str)] =
    &[(1, "Not started"), (2, "In progress"), (3, "Finished")];

pub fn customer() -> EntityDef {
    EntityDef::new(
        "Customer",
        "customer",
        "customer",
        vec![
            FieldDef::text("name", "tx_name", 120),
            FieldDef::email("email", "tx_email"),
            FieldDef::text("cpf", "tx_cpf", 11),
        ],
    )
    .with_filters(vec![
        FilterDef::local("name", Lookup::Like),
        FilterDef::local("email", Lookup::IContains),
        FilterDef::local("cpf", Lookup::Exact),
    ])
}

pub fn phone() -> EntityDef {
    EntityDef::new(
        "Phone",
        "phone",
        "phone",
        vec![
            FieldDef::text("number", "tx_number", 12),
            FieldDef::foreign_key("customer", "id_customer", "customer", OnDelete::Cascade),
        ],
    )
    .with_filters(vec![
        FilterDef::local("number", Lookup::Like),
        FilterDef::related("customer", &["customer"], "name", Lookup::Like),
    ])
}

pub fn brand() -> EntityDef {
    EntityDef::new(
        "Brand",
        "brand",
        "brand",
        vec![FieldDef::text("name", "tx_name", 120)],
    )
    .with_filters(vec![FilterDef::local("name", Lookup::Like)])
}

pub fn car_model() -> EntityDef {
    EntityDef::new(
        "CarModel",
        "car_model",
        "model",
        vec![
            FieldDef::text("name", "tx_name", 120),
            FieldDef::foreign_key("brand", "id_brand", "brand", OnDelete::Protect),
        ],
    )
    .with_filters(vec![
        FilterDef::local("name", Lookup::Like),
        FilterDef::related("brand", &["brand"], "name", Lookup::Like),
    ])
}

pub fn vehicle() -> EntityDef {
    EntityDef::new(
        "Vehicle",
        "vehicle",
        "vehicle",
        vec![
            FieldDef::bounded_integer("year", "nb_year", Some(1500), Some(9999)),
            FieldDef::choice("type", "nb_type", VEHICLE_TYPES, 1),
            FieldDef::unbounded_text("color", "tx_color"),
            FieldDef::text("license_plate", "nb_license_plate", 7),
            FieldDef::bounded_integer("km", "nb_km", Some(0), None),
            FieldDef::foreign_key("customer", "id_customer", "customer", OnDelete::Protect),
            FieldDef::foreign_key("car_model", "id_car_model", "car_model", OnDelete::Protect),
        ],
    )
    .with_filters(vec![
        FilterDef::local("license_plate", Lookup::Exact),
        FilterDef::related("customer", &["customer"], "name", Lookup::Like),
        FilterDef::related("model", &["car_model"], "name", Lookup::Like),
        FilterDef::local("type", Lookup::Exact),
    ])
}

pub fn service() -> EntityDef {
    EntityDef::new(
        "Service",
        "service",
        "service",
        vec![
            FieldDef::money("value", "nb_amount", 10),
            FieldDef::choice("status", "nb_status", SERVICE_STATUSES, 1),
            FieldDef::datetime("delivery_deadline", "dt_delivery_deadline"),
            FieldDef::datetime("start_date", "dt_start_date"),
            FieldDef::datetime("end_date", "dt_end_date"),
            FieldDef::text("description", "tx_description", 240),
            FieldDef::foreign_key("vehicle", "id_vehicle", "vehicle", OnDelete::Protect),
        ],
    )
    .with_filters(vec![
        FilterDef::local("status", Lookup::Exact),
        FilterDef::local("value", Lookup::Lte),
        FilterDef::local("delivery_deadline", Lookup::Gte),
        FilterDef::local("start_date", Lookup::Gte),
        FilterDef::local("end_date", Lookup::Lte),
        FilterDef::local("description", Lookup::Like),
        FilterDef::related("vehicle", &["vehicle"], "license_plate", Lookup::Exact),
        FilterDef::related("customer", &["vehicle", "customer"], "name", Lookup::Like),
    ])
}

pub fn method() -> EntityDef {
    EntityDef::new(
        "Method",
        "method",
        "payment_type",
        vec![FieldDef::text("payment_type", "tx_payment_type", 120)],
    )
    .with_filters(vec![FilterDef::local("payment_type", Lookup::Like)])
}

pub fn payment() -> EntityDef {
    EntityDef::new(
        "Payment",
        "payment",
        "payment",
        vec![
            FieldDef::money("discount", "nb_discount", 10),
            FieldDef::money("total", "nb_total", 10),
            FieldDef::foreign_key("service", "id_service", "service", OnDelete::Protect),
            FieldDef::foreign_key("method", "id_method", "method", OnDelete::Protect),
        ],
    )
    .with_filters(vec![
        FilterDef::local("total", Lookup::Gte),
        FilterDef::on("total_min", "total", Lookup::Lte),
        FilterDef::related("method", &["method"], "payment_type", Lookup::Like),
        FilterDef::related("service", &["service"], "status", Lookup::Exact),
    ])
}

pub fn address() -> EntityDef {
    EntityDef::new(
        "Address",
        "address",
        "address",
        vec![
            FieldDef::text("cep", "tx_cep", 8),
            FieldDef::text("street", "tx_street", 120),
            FieldDef::text("city", "tx_city", 120).optional(),
            FieldDef::text("neighborhood", "tx_neighborhood", 120),
            FieldDef::integer("house_number", "nb_house_number"),
            FieldDef::text("complement", "tx_complement", 120),
            FieldDef::text("reference", "tx_reference", 120),
        ],
    )
    .with_filters(vec![
        FilterDef::local("cep", Lookup::Exact),
        FilterDef::local("street", Lookup::Like),
        FilterDef::local("house_number", Lookup::Exact),
        FilterDef::local("complement", Lookup::Like),
        FilterDef::local("reference", Lookup::Like),
        FilterDef::local("city", Lookup::Like),
    ])
}

pub fn employer() -> EntityDef {
    EntityDef::new(
        "Employer",
        "employer",
        "employer",
        vec![
            FieldDef::text("name", "tx_name", 120),
            FieldDef::email("email", "tx_email"),
            FieldDef::text("cpf", "tx_cpf", 11),
            FieldDef::money("salary", "nb_salary", 5),
        ],
    )
    .with_filters(vec![
        FilterDef::local("name", Lookup::Like),
        FilterDef::local("email", Lookup::IContains),
        FilterDef::local("cpf", Lookup::StartsWith),
    ])
}

pub fn position() -> EntityDef {
    EntityDef::new(
        "Position",
        "position",
        "position",
        vec![
            FieldDef::text("position", "tx_position", 120),
            FieldDef::foreign_key("employer", "id_employer", "employer", OnDelete::Cascade),
        ],
    )
    .with_filters(vec![
        FilterDef::local("position", Lookup::Like),
        FilterDef::related("employer", &["employer"], "name", Lookup::Like),
    ])
}

/// All entities, parents before children so tables can be created in order.
pub fn all() -> Vec<EntityDef> {
    vec![
        customer(),
        phone(),
        brand(),
        car_model(),
        vehicle(),
        service(),
        method(),
        payment(),
        address(),
        employer(),
        position(),
    ]
}

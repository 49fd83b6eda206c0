//! Models and helpers shared by the integration tests
#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use schema_bridge::{Decimal, Model, ModelEnum};

/// Initialise logging once per test binary
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, PartialEq, Model)]
pub struct Person {
    pub id: i64,
    pub name: Option<String>,
}

pub fn people() -> Vec<Person> {
    vec![
        Person {
            id: 1,
            name: Some("a".to_string()),
        },
        Person { id: 2, name: None },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ModelEnum)]
pub enum Status {
    Active,
    #[model(rename = "on_hold")]
    OnHold,
}

#[derive(Debug, Clone, PartialEq, Model)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Model)]
#[model(name = "order")]
pub struct Order {
    pub id: i64,
    pub amount: Decimal<12, 2>,
    pub placed_at: NaiveDateTime,
    pub status: Status,
    pub location: Option<Point>,
    pub tags: Vec<String>,
}

/// Same columns as [`Order`], with the status stored as free text
#[derive(Debug, Clone, PartialEq, Model)]
pub struct OrderText {
    pub id: i64,
    pub amount: Decimal<12, 2>,
    pub placed_at: NaiveDateTime,
    pub status: String,
    pub location: Option<Point>,
    pub tags: Vec<String>,
}

pub fn placed_at(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .and_then(|date| date.and_hms_micro_opt(9, 30, 0, 250))
        .unwrap()
}

pub fn orders() -> Vec<Order> {
    vec![
        Order {
            id: 10,
            amount: Decimal(1_999),
            placed_at: placed_at(1),
            status: Status::Active,
            location: Some(Point { x: 1.5, y: -2.0 }),
            tags: vec!["new".to_string(), "priority".to_string()],
        },
        Order {
            id: 11,
            amount: Decimal(-5),
            placed_at: placed_at(2),
            status: Status::OnHold,
            location: None,
            tags: vec![],
        },
    ]
}

//! Encoded output must match serde_json byte for byte.

use plume::{Codec, Record, to_string, to_string_pretty};
use plume_testhelpers::test;
use serde::Serialize;

#[track_caller]
fn assert_same<T: Codec + Serialize>(value: &T) {
    assert_eq!(to_string(value), serde_json::to_string(value).unwrap());
    assert_eq!(to_string_pretty(value), serde_json::to_string_pretty(value).unwrap());
}

fn is_zero_i64(n: &i64) -> bool {
    *n == 0
}

fn is_zero_f64(n: &f64) -> bool {
    *n == 0.0
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Default, Record, Serialize)]
struct Flat {
    id: i64,
    ratio: f64,
    small: f32,
    active: bool,
    name: String,
    count: u16,
}

#[derive(Debug, Default, Record, Serialize)]
struct FlatOmit {
    #[plume(omit_empty)]
    #[serde(skip_serializing_if = "is_zero_i64")]
    id: i64,
    #[plume(omit_empty)]
    #[serde(skip_serializing_if = "is_zero_f64")]
    ratio: f64,
    #[plume(omit_empty)]
    #[serde(skip_serializing_if = "is_false")]
    active: bool,
    #[plume(omit_empty)]
    #[serde(skip_serializing_if = "String::is_empty")]
    name: String,
    #[plume(omit_empty)]
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
    #[plume(omit_empty)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
}

#[test]
fn flat_records() {
    assert_same(&Flat::default());
    assert_same(&Flat {
        id: -9_007_199_254_740_993,
        ratio: 1e-7,
        small: 3.25,
        active: true,
        name: "tab\there \"quoted\" \u{7f} \u{1}".into(),
        count: u16::MAX,
    });
    assert_same(&Flat {
        ratio: f64::NAN,
        small: f32::INFINITY,
        ..Flat::default()
    });

    assert_same(&FlatOmit::default());
    assert_same(&FlatOmit {
        id: 1,
        ratio: 2.5,
        active: true,
        name: "n".into(),
        note: Some(String::new()),
        tags: vec!["a".into(), String::new()],
    });
    assert_same(&FlatOmit {
        note: None,
        tags: vec![],
        name: "only".into(),
        ..FlatOmit::default()
    });
}

#[derive(Debug, Default, Record, Serialize)]
struct Inner {
    x: i32,
    #[serde(rename = "Y")]
    #[plume(rename = "Y")]
    y: Vec<i32>,
}

#[derive(Debug, Default, Record, Serialize)]
struct Outer {
    label: String,
    inner: Inner,
    list: Vec<Inner>,
    empty: Vec<Inner>,
}

#[test]
fn nested_records() {
    assert_same(&Outer::default());
    assert_same(&Outer {
        label: "outer".into(),
        inner: Inner { x: 1, y: vec![2, 3] },
        list: vec![Inner::default(), Inner { x: -4, y: vec![] }],
        empty: vec![],
    });
}

#[derive(Debug, Default, Record, Serialize)]
struct Pointers {
    one: Option<Box<i32>>,
    three: Option<Box<Option<Box<Option<i32>>>>>,
    record: Option<Box<Inner>>,
    #[plume(omit_empty)]
    #[serde(skip_serializing_if = "Option::is_none")]
    skipped: Option<Box<Inner>>,
}

#[test]
fn pointer_fields() {
    assert_same(&Pointers::default());
    assert_same(&Pointers {
        one: Some(Box::new(0)),
        three: Some(Box::new(Some(Box::new(None)))),
        record: Some(Box::new(Inner::default())),
        skipped: Some(Box::new(Inner { x: 5, y: vec![6] })),
    });
    assert_same(&Pointers {
        three: Some(Box::new(Some(Box::new(Some(12))))),
        ..Pointers::default()
    });
}

#[derive(Debug, Default, Record, Serialize)]
struct Base {
    id: u64,
    #[plume(omit_empty)]
    #[serde(skip_serializing_if = "String::is_empty")]
    kind: String,
}

#[derive(Debug, Default, Record, Serialize)]
struct Extra {
    weight: f32,
}

#[derive(Debug, Default, Record, Serialize)]
struct Embedding {
    name: String,
    #[plume(flatten)]
    #[serde(flatten)]
    base: Base,
    #[plume(flatten)]
    #[serde(flatten)]
    extra: Option<Box<Extra>>,
}

#[test]
fn embedded_records() {
    assert_same(&Embedding::default());
    assert_same(&Embedding {
        name: "e".into(),
        base: Base {
            id: 3,
            kind: "k".into(),
        },
        extra: Some(Box::new(Extra { weight: 0.25 })),
    });
}

#[derive(Debug, Default, Record, Serialize)]
struct Wide {
    a: u8,
    b: i8,
    c: u32,
    d: i32,
    e: u64,
    f: i64,
    g: usize,
    h: isize,
    i: f32,
    j: f64,
    k: bool,
    l: String,
    m: Option<u8>,
    n: Vec<bool>,
    o: Option<String>,
    p: Box<i16>,
    q: u16,
    r: Inner,
}

#[test]
fn many_fields() {
    assert_same(&Wide::default());
    assert_same(&Wide {
        a: u8::MAX,
        b: i8::MIN,
        c: u32::MAX,
        d: i32::MIN,
        e: u64::MAX,
        f: i64::MIN,
        g: 12,
        h: -12,
        i: 1.5e10,
        j: -0.0,
        k: true,
        l: "\u{2028}<&>".into(),
        m: Some(0),
        n: vec![true, false],
        o: Some("o".into()),
        p: Box::new(-1),
        q: 7,
        r: Inner { x: 1, y: vec![1] },
    });
}

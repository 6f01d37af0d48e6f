use bolero::check;
use plume::{MatcherKind, Record, compile_record_plan, from_str, to_string, to_string_pretty};
use plume_testhelpers::test;

#[derive(Debug, Default, Clone, PartialEq, Record)]
struct Sample {
    int: i64,
    small: u8,
    flag: bool,
    ratio: f64,
    #[plume(omit_empty)]
    maybe: Option<i32>,
    text: String,
    #[plume(omit_empty)]
    list: Vec<u16>,
    #[plume(string)]
    quoted: i32,
    boxed: Option<Box<u32>>,
}

#[test]
fn encode_then_decode_is_identity() {
    type Fields = (
        (i64, u8, bool, f64),
        (Option<i32>, String, Vec<u16>),
        (i32, Option<u32>),
    );

    check!().with_type::<Fields>().for_each(|fields: &Fields| {
        let ((int, small, flag, ratio), (maybe, text, list), (quoted, boxed)) = fields.clone();
        if !ratio.is_finite() {
            return;
        }
        let sample = Sample {
            int,
            small,
            flag,
            ratio,
            maybe,
            text,
            list,
            quoted,
            boxed: boxed.map(Box::new),
        };
        assert_eq!(from_str::<Sample>(&to_string(&sample)).unwrap(), sample);
        assert_eq!(from_str::<Sample>(&to_string_pretty(&sample)).unwrap(), sample);
    });
}

fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut out = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let first = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, first.clone());
            out.push(tail);
        }
    }
    out
}

#[test]
fn key_order_does_not_matter() {
    let members = [
        r#""int":-5"#,
        r#""text":"t""#,
        r#""list":[1,2]"#,
        r#""quoted":"9""#,
        r#""unknown":{"int":1}"#,
    ];
    let expected = Sample {
        int: -5,
        text: "t".into(),
        list: vec![1, 2],
        quoted: 9,
        ..Sample::default()
    };
    for order in permutations(&members) {
        let json = format!("{{{}}}", order.join(","));
        assert_eq!(from_str::<Sample>(&json).unwrap(), expected, "{json}");
    }
}

macro_rules! wide_record {
    ($name:ident: $($field:ident)*) => {
        #[derive(Debug, Default, PartialEq, Record)]
        struct $name {
            $($field: u32,)*
        }
    };
}

wide_record!(Eight: a b c d e f g h);
wide_record!(Nine: a b c d e f g h i);
wide_record!(Sixteen: a b c d e f g h i j k l m n o p);
wide_record!(Seventeen: a b c d e f g h i j k l m n o p q);

#[derive(Debug, Default, PartialEq, Record)]
struct LongKey {
    a: u32,
    b: u32,
    #[plume(rename = "a_key_that_is_clearly_longer_than_sixty_four_bytes_on_the_wire_xyz")]
    long: u32,
}

#[test]
fn matcher_boundaries_decode_alike() {
    assert_eq!(compile_record_plan::<Eight>().matcher_kind(), MatcherKind::Bitmap8);
    assert_eq!(compile_record_plan::<Nine>().matcher_kind(), MatcherKind::Bitmap16);
    assert_eq!(compile_record_plan::<Sixteen>().matcher_kind(), MatcherKind::Bitmap16);
    assert_eq!(compile_record_plan::<Seventeen>().matcher_kind(), MatcherKind::Exact);
    assert_eq!(compile_record_plan::<LongKey>().matcher_kind(), MatcherKind::Exact);

    let json = r#"{"b":2,"zz":0,"a":1,"h":8,"hh":9,"q":17}"#;
    let eight: Eight = from_str(json).unwrap();
    let nine: Nine = from_str(json).unwrap();
    let sixteen: Sixteen = from_str(json).unwrap();
    let seventeen: Seventeen = from_str(json).unwrap();
    let long: LongKey = from_str(json).unwrap();

    for (a, b) in [
        (eight.a, eight.b),
        (nine.a, nine.b),
        (sixteen.a, sixteen.b),
        (seventeen.a, seventeen.b),
        (long.a, long.b),
    ] {
        assert_eq!((a, b), (1, 2));
    }
    assert_eq!([eight.h, nine.h, sixteen.h, seventeen.h], [8; 4]);
    assert_eq!(seventeen.q, 17);
}

#[test]
fn bitmap_matching_ignores_ascii_case() {
    let json = r#"{"A":1,"B":2}"#;
    let fast: Nine = from_str(json).unwrap();
    assert_eq!((fast.a, fast.b), (1, 2));
    let exact: Seventeen = from_str(json).unwrap();
    assert_eq!((exact.a, exact.b), (0, 0));
}

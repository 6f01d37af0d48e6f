use std::io::{self, Read};

use plume::{
    DecodeError, DecodeErrorKind, DecodeOptions, Decoder, Record, from_reader, from_str,
};
use plume_testhelpers::{IPanic, test};

/// Hands out at most one byte per read, with an empty read in between.
struct Trickle<'a> {
    bytes: &'a [u8],
    stall: bool,
}

impl<'a> Trickle<'a> {
    fn new(json: &'a str) -> Self {
        Self {
            bytes: json.as_bytes(),
            stall: false,
        }
    }
}

impl Read for Trickle<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stall = !self.stall;
        if self.stall {
            return Err(io::ErrorKind::Interrupted.into());
        }
        let Some((&first, rest)) = self.bytes.split_first() else {
            return Ok(0);
        };
        if buf.is_empty() {
            return Ok(0);
        }
        buf[0] = first;
        self.bytes = rest;
        Ok(1)
    }
}

/// Fails after handing out its prefix.
struct Broken<'a>(&'a [u8]);

impl Read for Broken<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.0.is_empty() {
            return Err(io::Error::other("connection reset"));
        }
        let n = buf.len().min(self.0.len());
        buf[..n].copy_from_slice(&self.0[..n]);
        self.0 = &self.0[n..];
        Ok(n)
    }
}

#[derive(Debug, Default, PartialEq, Record)]
struct Meta {
    created: u64,
    #[plume(rename = "by")]
    author: Option<String>,
}

#[derive(Debug, Default, PartialEq, Record)]
struct Doc {
    title: String,
    #[plume(string)]
    version: u32,
    tags: Vec<String>,
    #[plume(flatten)]
    meta: Meta,
    parent: Option<Box<Doc>>,
    scores: Vec<f64>,
}

const DOC: &str = r#"
{
    "title": "escé\"aped",
    "ignored": {"deep": [1, [2, {"x": "}"}], null, true, -0.5e3]},
    "version": "3",
    "tags": ["a", "b\\c"],
    "created": 1700000000,
    "by": "me",
    "parent": {"title": "root", "version": "1", "parent": null, "TAGS": []},
    "scores": [1.5, -2, 1e2]
}
"#;

fn doc() -> Doc {
    Doc {
        title: "esc\u{e9}\"aped".into(),
        version: 3,
        tags: vec!["a".into(), "b\\c".into()],
        meta: Meta {
            created: 1_700_000_000,
            author: Some("me".into()),
        },
        parent: Some(Box::new(Doc {
            title: "root".into(),
            version: 1,
            ..Doc::default()
        })),
        scores: vec![1.5, -2.0, 100.0],
    }
}

#[test]
fn stream_and_buffer_agree() -> Result<(), IPanic> {
    let buffered: Doc = from_str(DOC)?;
    assert_eq!(buffered, doc());

    let streamed: Doc = from_reader(Trickle::new(DOC))?;
    assert_eq!(streamed, buffered);

    let mut decoder = Decoder::with_capacity(DOC.as_bytes(), 16);
    assert_eq!(decoder.decode::<Doc>()?, buffered);
    decoder.end()?;
    Ok(())
}

#[test]
fn errors_agree_across_engines() {
    let cases = [
        (r#"{"title":"x","version":3}"#, "plume::not_at_beginning_of_value"),
        (r#"{"title":"x" "version":"3"}"#, "plume::expected_comma_after_element"),
        (r#"{"title" "x"}"#, "plume::expected_colon_after_key"),
        (r#"{"title":nul}"#, "plume::invalid_character"),
        (r#"{"tags":["a",}"#, "plume::not_at_beginning_of_value"),
        (r#"{"title":"x","#, "plume::unexpected_end_of_input"),
        (r#"{"created":-1}"#, "plume::invalid_number"),
    ];
    for (json, code) in cases {
        let buffered = from_str::<Doc>(json).unwrap_err();
        let streamed = from_reader::<Doc, _>(Trickle::new(json)).unwrap_err();
        assert_eq!(buffered.code(), code, "{json}");
        assert_eq!(streamed, buffered, "{json}");
    }
}

#[test]
fn strict_mode_in_a_stream() {
    let json = r#"{"title":"x","parent":{"titel":"y"}}"#;
    let mut decoder = Decoder::new(Trickle::new(json))
        .with_options(DecodeOptions::new().deny_unknown_fields(true));
    let err = decoder.decode::<Doc>().unwrap_err();
    assert_eq!(
        err,
        DecodeError::new(
            DecodeErrorKind::UnknownField {
                field: "titel".into(),
                suggestion: Some("title"),
            },
            23,
        )
    );
}

#[test]
fn several_values_from_one_reader() -> Result<(), IPanic> {
    let input = "{\"created\":1}\n{\"created\":2,\"by\":null}\n\n{\"by\":\"z\"}\n";
    let mut decoder = Decoder::new(Trickle::new(input));
    let mut seen = Vec::new();
    while !decoder.is_at_end()? {
        seen.push(decoder.decode::<Meta>()?);
    }
    assert_eq!(
        seen,
        [
            Meta {
                created: 1,
                author: None,
            },
            Meta {
                created: 2,
                author: None,
            },
            Meta {
                created: 0,
                author: Some("z".into()),
            },
        ]
    );
    assert_eq!(decoder.offset(), input.len());
    Ok(())
}

#[test]
fn reader_failures_surface_as_io_errors() {
    let err = from_reader::<Meta, _>(Broken(br#"{"created":1"#)).unwrap_err();
    assert_eq!(err.code(), "plume::io");
    assert_eq!(err.kind, DecodeErrorKind::Io("connection reset".into()));
    assert_eq!(err.offset, 12);
}

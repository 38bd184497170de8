use std::sync::Arc;

use kat_bind::pipe::record::parse;
use kat_bind::{from_slice, to_value, Chain, Format, Record, Registry};
use serde_json::json;

#[derive(Debug, Default, PartialEq)]
struct User {
    id: i64,
    name: String,
    lang: String,
}

impl Record for User {
    fn accept(&mut self, _tag: &Chain, key: &Chain, value: &Chain) -> kat_bind::Result<()> {
        match key.as_bytes() {
            b"id" => self.id = parse(value)?,
            b"name" => self.name = value.to_string(),
            b"lang" => self.lang = value.to_string(),
            _ => {}
        }
        Ok(())
    }
}

fn registry() -> Arc<Registry> {
    let mut registry = Registry::standard();
    registry.register_record::<User>("User");
    Arc::new(registry)
}

#[rstest::rstest]
fn decodes_user_document() {
    let input = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
        <User lang=\"en\">\n  <id>1</id>\n  <name>kraity</name>\n</User>\n";
    let user: User = from_slice(Format::Xml, input, &registry()).unwrap();
    assert_eq!(
        user,
        User {
            id: 1,
            name: "kraity".to_string(),
            lang: "en".to_string()
        }
    );
}

#[rstest::rstest]
fn same_value_from_all_three_formats() {
    let expected = json!({"id": "1", "name": "kraity"});
    let kat = to_value(Format::Kat, b"User{s:id(1)s:name(kraity)}").unwrap();
    let json = to_value(Format::Json, br#"{"id":"1","name":"kraity"}"#).unwrap();
    let xml = to_value(Format::Xml, b"<User><id>1</id><name>kraity</name></User>").unwrap();
    assert_eq!(kat, expected);
    assert_eq!(json, expected);
    assert_eq!(xml, expected);
}

#[rstest::rstest]
fn skips_unknown_nested_elements() {
    let input = b"<User><extra a=\"</User>\"><deep><x/></deep><!-- </extra> --></extra>\
        <id>3</id><more><![CDATA[</more>]]></more><name>n</name></User>";
    let user: User = from_slice(Format::Xml, input, &registry()).unwrap();
    assert_eq!(user.id, 3);
    assert_eq!(user.name, "n");
}

#[rstest::rstest]
fn text_decodes_entities_and_cdata() {
    let value = to_value(
        Format::Xml,
        b"<r><a>x &lt; y &amp;&amp; z</a><b><![CDATA[&lt;]]>&#x41;</b></r>",
    )
    .unwrap();
    assert_eq!(value, json!({"a": "x < y && z", "b": "&lt;A"}));
}

#[rstest::rstest]
#[case(b"<r><a>1</A></r>".as_slice())]
#[case(b"<r><a>1</a>".as_slice())]
#[case(b"<r><a>1</a></r></r>".as_slice())]
#[case(b"<r><a>&bad;</a></r>".as_slice())]
#[case(b"<r><a x=\"1></a></r>".as_slice())]
fn malformed_documents_are_structural(#[case] input: &[u8]) {
    let err = to_value(Format::Xml, input).unwrap_err();
    assert!(err.is_structural(), "{err}");
}

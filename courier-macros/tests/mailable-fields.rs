use courier::mail::{MailableFields, MessageBuilder};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Clone, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
}

#[derive(Clone, Serialize, Deserialize, MailableFields)]
pub struct OrderShipped {
    pub order_id: u64,
    pub items: Vec<String>,
    #[mail(skip)]
    pub customer: Customer,
    secret: String,
    pub mail: MessageBuilder,
}

#[derive(Clone, Serialize, Deserialize, MailableFields)]
pub struct Marked {
    pub note: Option<String>,
    #[mail(builder)]
    pub envelope: MessageBuilder,
}

#[derive(Clone, Serialize, Deserialize, MailableFields)]
pub struct Generic<T: Serialize> {
    pub value: T,
    mail: MessageBuilder,
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Serialize, Deserialize, MailableFields)]
pub struct HTTPPing {
    mail: MessageBuilder,
}

fn shipped() -> OrderShipped {
    OrderShipped {
        order_id: 42,
        items: vec!["book".into(), "pen".into()],
        customer: Customer {
            name: "Jane".into(),
        },
        secret: "hidden".into(),
        mail: MessageBuilder::new(),
    }
}

#[test]
fn names_the_type_and_its_job() {
    assert_eq!(OrderShipped::NAME, "OrderShipped");
    assert_eq!(OrderShipped::JOB_TYPE, "mailable_fields::OrderShipped");
    assert_eq!(Marked::NAME, "Marked");
}

#[test]
fn titles_the_type_name() {
    assert_eq!(OrderShipped::TITLE, "Order Shipped");
    assert_eq!(Marked::TITLE, "Marked");
    assert_eq!(HTTPPing::TITLE, "Http Ping");
}

#[test]
fn exposes_only_public_unskipped_fields() {
    let fields = shipped().public_fields().unwrap();

    assert_eq!(
        serde_json::Value::Object(fields),
        json!({ "order_id": 42, "items": ["book", "pen"] })
    );
}

#[test]
fn keeps_declaration_order() {
    let fields = shipped().public_fields().unwrap();
    let keys: Vec<_> = fields.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["order_id", "items"]);
}

#[test]
fn reaches_the_builder_field() {
    let mut shipped = shipped();
    shipped.builder_mut().subject("Shipped");
    assert!(shipped.builder().has_subject("Shipped"));
    assert!(shipped.mail.has_subject("Shipped"));

    let mut marked = Marked {
        note: None,
        envelope: MessageBuilder::new(),
    };
    marked.builder_mut().to("jane@example.com");
    assert!(marked.envelope.has_to("jane@example.com", None));
    assert_eq!(
        serde_json::Value::Object(marked.public_fields().unwrap()),
        json!({ "note": null })
    );
}

#[test]
fn supports_generic_structs() {
    let generic = Generic {
        value: 7_u8,
        mail: MessageBuilder::new(),
    };
    assert_eq!(
        serde_json::Value::Object(generic.public_fields().unwrap()),
        json!({ "value": 7 })
    );
}

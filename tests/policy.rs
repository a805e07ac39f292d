use dotsandbox::prelude::*;

fn runtime(namespace: &str, name: &str) -> SigType {
    SigType::Named(TypeDescriptor::Referenced {
        namespace: namespace.to_string(),
        name: name.to_string(),
        scope: ResolutionScope::Assembly("System.Runtime".to_string()),
    })
}

fn foo(params: Vec<SigType>) -> MemberReference {
    MemberReference::Method {
        parent: runtime("Content.Api", "Bar"),
        name: "Foo".to_string(),
        return_type: SigType::Primitive(Primitive::Void),
        generic_arity: 0,
        params,
    }
}

#[test]
fn method_declaration_matches_signature() {
    let rule = parse_method("Void Foo(Int32, String)").unwrap();

    assert!(rule.matches(&foo(vec![
        SigType::Primitive(Primitive::Int32),
        SigType::Primitive(Primitive::String),
    ])));

    assert!(!rule.matches(&foo(vec![
        SigType::Primitive(Primitive::Int64),
        SigType::Primitive(Primitive::String),
    ])));
    assert!(!rule.matches(&foo(vec![
        SigType::Primitive(Primitive::Int32),
        SigType::Primitive(Primitive::Object),
    ])));
    assert!(!rule.matches(&foo(vec![SigType::Primitive(Primitive::Int32)])));
}

#[test]
fn keywords_and_clr_names_are_equivalent() {
    let keywords = parse_method("void Foo(int, string)").unwrap();
    let qualified = parse_method("System.Void Foo(System.Int32, System.String)").unwrap();
    let clr = parse_method("Void Foo(Int32, String)").unwrap();

    assert_eq!(keywords, clr);
    assert_eq!(qualified, clr);
}

#[test]
fn field_declarations() {
    let rule = parse_field("System.Collections.Generic.List`1<string> Items").unwrap();
    let items = MemberReference::Field {
        parent: runtime("Content.Api", "Bar"),
        name: "Items".to_string(),
        field_type: SigType::Generic {
            base: Box::new(SigType::Named(TypeDescriptor::Referenced {
                namespace: "System.Collections.Generic".to_string(),
                name: "List`1".to_string(),
                scope: ResolutionScope::Assembly("System.Collections".to_string()),
            })),
            args: vec![SigType::Primitive(Primitive::String)],
        },
    };

    assert!(rule.matches(&items));
    assert!(parse_field("Broken").is_err());
}

#[test]
fn method_rule_failures_narrow_the_policy() {
    let policy = SandboxPolicy::from_json(
        r#"{
            "Content.Api": {
                "Bar": {
                    "methods": ["Void Foo(Int32, String)", "Void Foo(Int32"],
                    "fields": ["int Count"]
                }
            }
        }"#,
    )
    .unwrap();

    let bar = policy.type_config("Content.Api", "Bar").unwrap();
    assert_eq!(bar.methods_raw().len(), 2);
    assert_eq!(bar.methods().len(), 1);
    assert_eq!(bar.fields().len(), 1);
}

#[test]
fn field_rule_failures_reject_the_policy() {
    let result = SandboxPolicy::from_json(
        r#"{ "Content.Api": { "Bar": { "fields": ["int Count(", "int Other"] } } }"#,
    );

    assert!(matches!(result, Err(Error::PolicyField { .. })));
}

#[test]
fn whitelist_errors_carry_the_position() {
    match parse_method("Void Foo(Int32") {
        Err(Error::Whitelist { position, .. }) => assert_eq!(position, 14),
        other => panic!("unexpected result {other:?}"),
    }
}

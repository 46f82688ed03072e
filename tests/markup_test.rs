use infolink::errors::LinkError;
use infolink::markup::*;
use pretty_assertions::assert_eq;

#[test]
fn test_parse_and_serialize() {
    let xml = r#"<doc recordId="r1"><p class="x">Fish &amp; chips <b>now</b></p><br/></doc>"#;
    let tree = parse_document(xml, "a/doc.html").unwrap();
    assert_eq!(tree.tag(), "doc");
    assert_eq!(tree.get(RECORD_ID_ATTR), Some("r1"));
    assert_eq!(tree.text(), "Fish & chips now");
    assert_eq!(tree.to_xml_string(), xml);
}

#[test]
fn test_serialize_escapes_attributes() {
    let element = Element::new("link").with_attr("query", "a \"b\" & <c>");
    assert_eq!(
        element.to_xml_string(),
        r#"<link query="a &quot;b&quot; &amp; &lt;c&gt;"/>"#
    );
}

#[test]
fn test_parse_error_names_document() {
    match parse_document("<doc><p></doc>", "a/broken.html") {
        Err(LinkError::Markup { document, .. }) => assert_eq!(document, "a/broken.html"),
        other => panic!("expected markup error, got {other:?}"),
    }
}

#[test]
fn test_set_keeps_attribute_position() {
    let mut element = Element::new("link")
        .with_attr("jumpDestination", "intro")
        .with_attr("infobase", "Manual A");
    element.set("jumpDestination", "usage");
    element.set("resolved", "true");
    let names: Vec<&str> = element.attributes().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["jumpDestination", "infobase", "resolved"]);
    assert_eq!(element.get("jumpDestination"), Some("usage"));
}

#[test]
fn test_visit_mut_pull_keeps_content() {
    let mut tree = parse_document(
        "<doc><p>See <link jumpDestination=\"x\">the <i>intro</i></link> page</p></doc>",
        "doc",
    )
    .unwrap();

    tree.visit_mut(&mut |element: &mut Element| -> Result<Visit, LinkError> {
        Ok(if element.tag() == "link" {
            Visit::Pull
        } else {
            Visit::Keep
        })
    })
    .unwrap();

    assert_eq!(
        tree.to_xml_string(),
        "<doc><p>See the <i>intro</i> page</p></doc>"
    );
}

#[test]
fn test_visit_mut_visits_pulled_children() {
    let mut tree = Element::new("doc").with_child(
        Element::new("link")
            .with_attr("jumpDestination", "outer")
            .with_child(Element::new("link").with_attr("jumpDestination", "inner")),
    );

    let mut seen = Vec::new();
    tree.visit_mut(&mut |element: &mut Element| -> Result<Visit, LinkError> {
        seen.push(element.get("jumpDestination").unwrap_or_default().to_string());
        Ok(Visit::Pull)
    })
    .unwrap();

    assert_eq!(seen, vec!["outer", "inner"]);
    assert!(tree.children().is_empty());
}

#[test]
fn test_visit_mut_error_leaves_tree_intact() {
    let xml = "<doc><a/><link query=\"q\"/><b/></doc>";
    let mut tree = parse_document(xml, "doc").unwrap();

    let result = tree.visit_mut(&mut |element: &mut Element| -> Result<Visit, String> {
        if element.tag() == "link" {
            Err("stop".to_string())
        } else {
            Ok(Visit::Pull)
        }
    });

    assert_eq!(result, Err("stop".to_string()));
    assert_eq!(tree.to_xml_string(), "<doc><link query=\"q\"/><b/></doc>");
}

#[test]
fn test_link_element_classification() {
    let query = Element::new("link")
        .with_attr("query", "printer")
        .with_attr("jumpDestination", "intro")
        .with_attr("infobase", "Manual A");
    assert_eq!(
        LinkElement::from_element(&query),
        Some(LinkElement::Query {
            collection: Some("Manual A".to_string()),
            query: "printer".to_string(),
        })
    );

    let jump = Element::new("link").with_attr("jumpDestination", "intro");
    let parsed = LinkElement::from_element(&jump).unwrap();
    assert_eq!(parsed.collection(), None);
    assert_eq!(
        parsed,
        LinkElement::Destination {
            collection: None,
            name: "intro".to_string(),
        }
    );

    assert_eq!(LinkElement::from_element(&Element::new("link")), None);
    assert_eq!(
        LinkElement::from_element(&Element::new("span").with_attr("query", "x")),
        None
    );
}

#[test]
fn test_bookmark_element() {
    let bookmark = Element::new("bookmark").with_attr("name", "intro");
    assert_eq!(
        BookmarkElement::from_element(&bookmark).map(|b| b.name),
        Some("intro".to_string())
    );
    assert!(BookmarkElement::from_element(&Element::new("a")).is_none());
}

#[test]
fn test_descendants_in_document_order() {
    let tree = parse_document("<doc><a><b/></a><c/></doc>", "doc").unwrap();
    let tags: Vec<&str> = tree.descendants().iter().map(|e| e.tag()).collect();
    assert_eq!(tags, vec!["a", "b", "c"]);
}

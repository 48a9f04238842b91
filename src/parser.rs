use crate::error::BbbError;

use anyhow::Context;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_till, take_until, take_while1};
use nom::character::complete::{char, multispace0, multispace1};
use nom::combinator::{map, opt, recognize, verify};
use nom::error::{convert_error, ErrorKind, VerboseError};
use nom::multi::many0;
use nom::sequence::{delimited, pair, preceded, tuple};
use nom::{error_position, Err, IResult};

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn required_attr(&self, name: &str) -> Result<&str, BbbError> {
        self.attr(name).ok_or_else(|| BbbError::MissingAttribute {
            element: self.name.clone(),
            attribute: name.to_string(),
        })
    }

    /// First attribute whose name contains `fragment`, for namespaced names
    /// such as `xlink:href`.
    pub fn attr_containing(&self, fragment: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.contains(fragment))
            .map(|(_, value)| value.as_str())
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |e| e.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    /// Like [`Element::child`], but a missing element is an error.
    pub fn find(&self, name: &str) -> Result<&Element, BbbError> {
        self.child(name)
            .ok_or_else(|| BbbError::MissingElement(name.to_string()))
    }

    /// Concatenated text content of the direct children, trimmed.
    pub fn text(&self) -> String {
        let text: String = self
            .children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                Node::Element(_) => None,
            })
            .collect();
        text.trim().to_string()
    }
}

pub fn parse_document(input: &str) -> Result<Element, anyhow::Error> {
    match document(input) {
        Ok((_, root)) => Ok(root),
        Err(Err::Error(err)) | Err(Err::Failure(err)) => {
            let conv = convert_error(input, err);
            Err(BbbError::ParseError(conv)).context("Failed to parse XML document")
        }
        Err(Err::Incomplete(_)) => {
            unreachable!("Incomplete data received by non-streaming parser.")
        }
    }
}

fn document(input: &str) -> Res<Element> {
    let (input, _) = opt(tag("\u{FEFF}"))(input)?;
    let (input, _) = many0(alt((multispace1, comment, processing_instruction, doctype)))(input)?;
    let (input, root) = element(input)?;
    let (input, _) = many0(alt((multispace1, comment, processing_instruction)))(input)?;
    let (input, _) = end_of_file(input)?;
    Ok((input, root))
}

fn end_of_file(input: &str) -> Res<&str> {
    if input.is_empty() {
        Ok((input, input))
    } else {
        std::result::Result::Err(Err::Error(error_position!(input, ErrorKind::Eof)))
    }
}

fn comment(input: &str) -> Res<&str> {
    recognize(tuple((tag("<!--"), take_until("-->"), tag("-->"))))(input)
}

fn processing_instruction(input: &str) -> Res<&str> {
    recognize(tuple((tag("<?"), take_until("?>"), tag("?>"))))(input)
}

fn doctype(input: &str) -> Res<&str> {
    recognize(tuple((tag("<!DOCTYPE"), take_until(">"), char('>'))))(input)
}

fn cdata(input: &str) -> Res<&str> {
    delimited(tag("<![CDATA["), take_until("]]>"), tag("]]>"))(input)
}

fn xml_name(input: &str) -> Res<&str> {
    take_while1(|c: char| c.is_alphanumeric() || matches!(c, ':' | '_' | '-' | '.'))(input)
}

fn attribute(input: &str) -> Res<(String, String)> {
    let (input, key) = xml_name(input)?;
    let (input, _) = tuple((multispace0, char('='), multispace0))(input)?;
    let (input, value) = alt((
        delimited(char('"'), take_till(|c: char| c == '"'), char('"')),
        delimited(char('\''), take_till(|c: char| c == '\''), char('\'')),
    ))(input)?;
    Ok((input, (key.to_string(), unescape(value))))
}

fn element(input: &str) -> Res<Element> {
    let (input, _) = char('<')(input)?;
    let (input, name) = xml_name(input)?;
    let (input, attributes) = many0(preceded(multispace1, attribute))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, closing) = alt((tag("/>"), tag(">")))(input)?;

    let mut element = Element {
        name: name.to_string(),
        attributes,
        children: Vec::new(),
    };
    if closing == "/>" {
        return Ok((input, element));
    }

    let (input, nodes) = many0(node)(input)?;
    let (input, _) = delimited(
        tag("</"),
        verify(xml_name, |n: &str| n == name),
        pair(multispace0, char('>')),
    )(input)?;

    element.children = nodes.into_iter().flatten().collect();
    Ok((input, element))
}

fn node(input: &str) -> Res<Option<Node>> {
    alt((
        map(alt((comment, processing_instruction)), |_| None),
        map(cdata, |text: &str| Some(Node::Text(text.to_string()))),
        map(element, |element| Some(Node::Element(element))),
        map(take_while1(|c: char| c != '<'), |text: &str| {
            Some(Node::Text(unescape(text)))
        }),
    ))(input)
}

/// Resolves the predefined and numeric character references. Anything that
/// does not form a known reference is kept as written.
fn unescape(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .and_then(|semi| decode_entity(&tail[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

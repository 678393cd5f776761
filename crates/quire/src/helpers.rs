//! Functions and filters available to every template.
//!
//! Functions take named arguments (`{{ add(a=1, b=2) }}`); the one-argument
//! helpers double as filters (`{{ post.content | safe_html }}`).

use crate::parsing::{slugify, slugify_tag};
use std::collections::HashMap;
use tera::{Error, Filter, Function, Tera, Value, from_value, to_value};

type Args = HashMap<String, Value>;

/// Longest list `seq` will build.
const MAX_SEQ_LEN: i64 = 100_000;

pub fn register_helpers(tera: &mut Tera, post_types: &HashMap<String, String>) {
    tera.register_function("safe_html", SafeHtml);
    tera.register_filter("safe_html", SafeHtml);

    tera.register_function("join", join);

    tera.register_function("slugify", unary_string("s", slugify));
    tera.register_filter("slugify", string_filter(slugify));
    tera.register_function("slugify_tag", unary_string("s", slugify_tag));
    tera.register_filter("slugify_tag", string_filter(slugify_tag));

    tera.register_function("inc", unary_int("inc", |i| i.checked_add(1)));
    tera.register_filter("inc", int_filter("inc", |i| i.checked_add(1)));
    tera.register_function("dec", unary_int("dec", |i| i.checked_sub(1)));
    tera.register_filter("dec", int_filter("dec", |i| i.checked_sub(1)));

    tera.register_function("add", binary_int("add", i64::checked_add));
    tera.register_function("sub", binary_int("sub", i64::checked_sub));
    tera.register_function("subtract", binary_int("subtract", i64::checked_sub));
    tera.register_function("max", binary_int("max", |a, b| Some(a.max(b))));
    tera.register_function("min", binary_int("min", |a, b| Some(a.min(b))));
    tera.register_function("mod", binary_int("mod", i64::checked_rem));

    tera.register_function("seq", seq);

    tera.register_function("len", |args: &Args| -> tera::Result<Value> {
        length(arg(args, "posts")?)
    });
    tera.register_filter("len", |value: &Value, _: &Args| length(value));

    let labels = post_types.clone();
    tera.register_function("post_types", move |args: &Args| -> tera::Result<Value> {
        let key: String = from_value(arg(args, "key")?.clone())?;
        Ok(Value::String(post_type_label(&labels, &key)))
    });
    let labels = post_types.clone();
    tera.register_filter("post_types", move |value: &Value, _: &Args| -> tera::Result<Value> {
        let key: String = from_value(value.clone())?;
        Ok(Value::String(post_type_label(&labels, &key)))
    });
}

fn post_type_label(labels: &HashMap<String, String>, key: &str) -> String {
    match labels.get(key) {
        Some(label) if !label.is_empty() => label.clone(),
        _ => "-".to_string(),
    }
}

/// Passes its input through untouched and tells tera not to escape it.
struct SafeHtml;

impl Function for SafeHtml {
    fn call(&self, args: &Args) -> tera::Result<Value> {
        Ok(arg(args, "s")?.clone())
    }

    fn is_safe(&self) -> bool {
        true
    }
}

impl Filter for SafeHtml {
    fn filter(&self, value: &Value, _: &Args) -> tera::Result<Value> {
        Ok(value.clone())
    }

    fn is_safe(&self) -> bool {
        true
    }
}

fn arg<'a>(args: &'a Args, name: &str) -> tera::Result<&'a Value> {
    args.get(name)
        .ok_or_else(|| Error::msg(format!("missing argument `{name}`")))
}

fn int_arg(args: &Args, name: &str) -> tera::Result<i64> {
    as_int(arg(args, name)?, name)
}

fn as_int(value: &Value, name: &str) -> tera::Result<i64> {
    value
        .as_i64()
        .ok_or_else(|| Error::msg(format!("`{name}` must be an integer, got {value}")))
}

fn unary_string(name: &'static str, apply: fn(&str) -> String) -> impl Function {
    move |args: &Args| -> tera::Result<Value> {
        let input: String = from_value(arg(args, name)?.clone())?;
        Ok(Value::String(apply(&input)))
    }
}

fn string_filter(apply: fn(&str) -> String) -> impl Filter {
    move |value: &Value, _: &Args| -> tera::Result<Value> {
        let input: String = from_value(value.clone())?;
        Ok(Value::String(apply(&input)))
    }
}

fn out_of_range(name: &str) -> Error {
    Error::msg(format!("{name}: result out of range"))
}

fn unary_int(name: &'static str, apply: fn(i64) -> Option<i64>) -> impl Function {
    move |args: &Args| -> tera::Result<Value> {
        let result = apply(int_arg(args, "i")?).ok_or_else(|| out_of_range(name))?;
        Ok(Value::from(result))
    }
}

fn int_filter(name: &'static str, apply: fn(i64) -> Option<i64>) -> impl Filter {
    move |value: &Value, _: &Args| -> tera::Result<Value> {
        let result = apply(as_int(value, "value")?).ok_or_else(|| out_of_range(name))?;
        Ok(Value::from(result))
    }
}

/// `None` from `apply` (overflow, division by zero) becomes a render error.
fn binary_int(name: &'static str, apply: fn(i64, i64) -> Option<i64>) -> impl Function {
    move |args: &Args| -> tera::Result<Value> {
        let result =
            apply(int_arg(args, "a")?, int_arg(args, "b")?).ok_or_else(|| out_of_range(name))?;
        Ok(Value::from(result))
    }
}

fn join(args: &Args) -> tera::Result<Value> {
    let items: Vec<String> = from_value(arg(args, "xs")?.clone())?;
    let separator: String = from_value(arg(args, "sep")?.clone())?;
    Ok(Value::String(items.join(&separator)))
}

/// Inclusive range `[a, b]`; empty when `b < a`.
fn seq(args: &Args) -> tera::Result<Value> {
    let start = int_arg(args, "a")?;
    let end = int_arg(args, "b")?;
    if end < start {
        return Ok(Value::Array(Vec::new()));
    }

    match end.checked_sub(start) {
        Some(span) if span < MAX_SEQ_LEN => Ok(to_value((start..=end).collect::<Vec<i64>>())?),
        _ => Err(Error::msg(format!(
            "seq: range {start}..={end} is longer than {MAX_SEQ_LEN} items"
        ))),
    }
}

fn length(value: &Value) -> tera::Result<Value> {
    match value {
        Value::Array(items) => Ok(Value::from(items.len())),
        Value::Null => Ok(Value::from(0)),
        other => Err(Error::msg(format!("len expects a list of posts, got {other}"))),
    }
}

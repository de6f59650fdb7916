//! The curated `@boop/` module system.
//!
//! Scripts get a global `require()` that resolves exactly three kinds of
//! path: the native `@boop/yaml` and `@boop/plist` modules, and
//! `@boop/<x>` where `lib/<x>.js` ships in the embedded asset tree (served
//! as a CommonJS-style module). Everything else throws
//! `cannot find module '<path>'`.
//!
//! Values cross the JS boundary as JSON text through the engine's own
//! serializer, so no hand-rolled value walker has to chase the QuickJS
//! type system.

use rquickjs::convert::Coerced;
use rquickjs::object::Property;
use rquickjs::{Ctx, Exception, Function, Object, Value};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Hidden global holding resolved modules so repeated `require()` calls
/// within one runtime return the same object.
const MODULE_CACHE: &str = "__boop_modules";

/// Install `require` and the module cache on the runtime's globals.
pub fn install(ctx: &Ctx<'_>) -> rquickjs::Result<()> {
    let globals = ctx.globals();
    globals.prop(MODULE_CACHE, Property::from(Object::new(ctx.clone())?))?;

    let require = Function::new(ctx.clone(), require_fn)?;
    globals.set("require", require)?;
    Ok(())
}

fn require_fn<'js>(ctx: Ctx<'js>, name: Coerced<String>) -> rquickjs::Result<Value<'js>> {
    resolve(&ctx, &name.0)
}

fn resolve<'js>(ctx: &Ctx<'js>, name: &str) -> rquickjs::Result<Value<'js>> {
    let cache: Object = ctx.globals().get(MODULE_CACHE)?;
    let cached: Value = cache.get(name)?;
    if !cached.is_undefined() {
        return Ok(cached);
    }

    let module: Value = match name {
        "@boop/yaml" => yaml_module(ctx)?.into_value(),
        "@boop/plist" => plist_module(ctx)?.into_value(),
        _ => {
            let Some(bare) = name.strip_prefix("@boop/") else {
                return Err(Exception::throw_message(
                    ctx,
                    &format!("cannot find module '{name}'"),
                ));
            };
            let Some(source) = boopkit_assets::lib_module(bare) else {
                return Err(Exception::throw_message(
                    ctx,
                    &format!("cannot find module '{name}'"),
                ));
            };
            eval_lib_module(ctx, source)?
        }
    };

    cache.set(name, module.clone())?;
    Ok(module)
}

/// Evaluate an embedded `lib/` file as a CommonJS-style module and return
/// its `module.exports`.
fn eval_lib_module<'js>(ctx: &Ctx<'js>, source: &str) -> rquickjs::Result<Value<'js>> {
    let wrapped = format!("(function(module, exports, require) {{\n{source}\n}})");
    let factory: Function = ctx.eval(wrapped)?;

    let module = Object::new(ctx.clone())?;
    let exports = Object::new(ctx.clone())?;
    module.set("exports", exports.clone())?;
    let require: Value = ctx.globals().get("require")?;

    factory.call::<_, ()>((module.clone(), exports, require))?;
    module.get("exports")
}

// ============================================================================
// @boop/yaml
// ============================================================================

fn yaml_module<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<Object<'js>> {
    let exports = Object::new(ctx.clone())?;

    exports.set("parse", Function::new(ctx.clone(), yaml_parse)?)?;
    exports.set("stringify", Function::new(ctx.clone(), yaml_stringify)?)?;

    Ok(exports)
}

fn yaml_parse<'js>(ctx: Ctx<'js>, src: Coerced<String>) -> rquickjs::Result<Value<'js>> {
    let parsed: serde_yaml::Value = serde_yaml::from_str(&src.0)
        .map_err(|e| Exception::throw_message(&ctx, &format!("yaml.parse: {e}")))?;
    let json = yaml_to_json(parsed);
    let text = serde_json::to_string(&json)
        .map_err(|e| Exception::throw_message(&ctx, &format!("yaml.parse: {e}")))?;
    ctx.json_parse(text)
}

fn yaml_stringify<'js>(ctx: Ctx<'js>, value: Value<'js>) -> rquickjs::Result<String> {
    let json = value_to_json(&ctx, value, "yaml.stringify")?;
    serde_yaml::to_string(&json)
        .map_err(|e| Exception::throw_message(&ctx, &format!("yaml.stringify: {e}")))
}

/// Recursively normalize a YAML document so every mapping key is a string.
/// Interior maps and sequences are recursed; scalars pass through.
fn yaml_to_json(value: serde_yaml::Value) -> serde_json::Value {
    match value {
        serde_yaml::Value::Null => serde_json::Value::Null,
        serde_yaml::Value::Bool(b) => serde_json::Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                serde_json::Value::from(i)
            } else if let Some(u) = n.as_u64() {
                serde_json::Value::from(u)
            } else {
                serde_json::Number::from_f64(n.as_f64().unwrap_or(0.0))
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            }
        }
        serde_yaml::Value::String(s) => serde_json::Value::String(s),
        serde_yaml::Value::Sequence(seq) => {
            serde_json::Value::Array(seq.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(map) => {
            let mut object = serde_json::Map::with_capacity(map.len());
            for (key, val) in map {
                object.insert(yaml_key_to_string(&key), yaml_to_json(val));
            }
            serde_json::Value::Object(object)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json((*tagged).value),
    }
}

fn yaml_key_to_string(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

// ============================================================================
// @boop/plist
// ============================================================================

fn plist_module<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<Object<'js>> {
    let exports = Object::new(ctx.clone())?;

    exports.set("parse", Function::new(ctx.clone(), plist_parse)?)?;
    exports.set("parseBinary", Function::new(ctx.clone(), plist_parse_binary)?)?;
    exports.set("stringify", Function::new(ctx.clone(), plist_stringify)?)?;

    Ok(exports)
}

fn plist_parse<'js>(ctx: Ctx<'js>, src: Coerced<String>) -> rquickjs::Result<Value<'js>> {
    let parsed = plist::Value::from_reader_xml(src.0.as_bytes())
        .map_err(|e| Exception::throw_message(&ctx, &format!("plist.parse: {e}")))?;
    let text = serde_json::to_string(&plist_to_json(parsed))
        .map_err(|e| Exception::throw_message(&ctx, &format!("plist.parse: {e}")))?;
    ctx.json_parse(text)
}

fn plist_parse_binary<'js>(ctx: Ctx<'js>, src: Coerced<String>) -> rquickjs::Result<Value<'js>> {
    let bytes = string_to_bytes(&src.0);
    let parsed = plist::Value::from_reader(std::io::Cursor::new(bytes))
        .map_err(|e| Exception::throw_message(&ctx, &format!("plist.parseBinary: {e}")))?;
    let text = serde_json::to_string(&plist_to_json(parsed))
        .map_err(|e| Exception::throw_message(&ctx, &format!("plist.parseBinary: {e}")))?;
    ctx.json_parse(text)
}

fn plist_stringify<'js>(ctx: Ctx<'js>, value: Value<'js>) -> rquickjs::Result<String> {
    let json = value_to_json(&ctx, value, "plist.stringify")?;
    let plist_value = json_to_plist(&json)
        .map_err(|e| Exception::throw_message(&ctx, &format!("plist.stringify: {e}")))?;
    let mut out = Vec::new();
    plist_value
        .to_writer_xml(&mut out)
        .map_err(|e| Exception::throw_message(&ctx, &format!("plist.stringify: {e}")))?;
    String::from_utf8(out)
        .map_err(|e| Exception::throw_message(&ctx, &format!("plist.stringify: {e}")))
}

fn plist_to_json(value: plist::Value) -> serde_json::Value {
    match value {
        plist::Value::String(s) => serde_json::Value::String(s),
        plist::Value::Boolean(b) => serde_json::Value::Bool(b),
        plist::Value::Integer(i) => {
            if let Some(v) = i.as_signed() {
                serde_json::Value::from(v)
            } else if let Some(v) = i.as_unsigned() {
                serde_json::Value::from(v)
            } else {
                serde_json::Value::Null
            }
        }
        plist::Value::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        plist::Value::Date(date) => {
            let time = std::time::SystemTime::from(date);
            serde_json::Value::String(chrono::DateTime::<chrono::Utc>::from(time).to_rfc3339())
        }
        plist::Value::Data(bytes) => serde_json::Value::String(BASE64.encode(bytes)),
        plist::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(plist_to_json).collect())
        }
        plist::Value::Dictionary(dict) => {
            let mut object = serde_json::Map::new();
            for (key, val) in dict {
                object.insert(key, plist_to_json(val));
            }
            serde_json::Value::Object(object)
        }
        _ => serde_json::Value::Null,
    }
}

fn json_to_plist(value: &serde_json::Value) -> Result<plist::Value, String> {
    match value {
        serde_json::Value::Null => Err("cannot encode null".to_string()),
        serde_json::Value::Bool(b) => Ok(plist::Value::Boolean(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(plist::Value::Integer(i.into()))
            } else if let Some(u) = n.as_u64() {
                Ok(plist::Value::Integer(u.into()))
            } else {
                Ok(plist::Value::Real(n.as_f64().unwrap_or(0.0)))
            }
        }
        serde_json::Value::String(s) => Ok(plist::Value::String(s.clone())),
        serde_json::Value::Array(items) => Ok(plist::Value::Array(
            items.iter().map(json_to_plist).collect::<Result<_, _>>()?,
        )),
        serde_json::Value::Object(map) => {
            let mut dict = plist::Dictionary::new();
            for (key, val) in map {
                dict.insert(key.clone(), json_to_plist(val)?);
            }
            Ok(plist::Value::Dictionary(dict))
        }
    }
}

// ============================================================================
// Shared plumbing
// ============================================================================

/// Serialize a JS value to a JSON document via the engine's own serializer.
/// Unserializable values (undefined, functions) throw a script-visible error.
fn value_to_json<'js>(
    ctx: &Ctx<'js>,
    value: Value<'js>,
    what: &str,
) -> rquickjs::Result<serde_json::Value> {
    let Some(text) = ctx.json_stringify(value)? else {
        return Err(Exception::throw_message(
            ctx,
            &format!("{what}: cannot encode the given value"),
        ));
    };
    let text = text.to_string()?;
    serde_json::from_str(&text)
        .map_err(|e| Exception::throw_message(ctx, &format!("{what}: {e}")))
}

/// Interpret a JS string as raw bytes. Strings whose code points all fit in
/// one byte (the shape produced by `atob`) map code point per byte;
/// anything else falls back to UTF-8.
fn string_to_bytes(s: &str) -> Vec<u8> {
    if s.chars().all(|c| (c as u32) <= 0xFF) {
        s.chars().map(|c| c as u8).collect()
    } else {
        s.as_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_string_keys_pass_through() {
        let parsed: serde_yaml::Value = serde_yaml::from_str("name: Alice\nage: 30").unwrap();
        let json = yaml_to_json(parsed);
        assert_eq!(json["name"], "Alice");
        assert_eq!(json["age"], 30);
    }

    #[test]
    fn test_yaml_non_string_keys_normalized() {
        let parsed: serde_yaml::Value = serde_yaml::from_str("1: one\ntrue: yes\n").unwrap();
        let json = yaml_to_json(parsed);
        let object = json.as_object().unwrap();
        assert!(object.contains_key("1"));
        assert!(object.contains_key("true"));
    }

    #[test]
    fn test_yaml_nested_keys_normalized_recursively() {
        let parsed: serde_yaml::Value =
            serde_yaml::from_str("outer:\n  2: two\nlist:\n  - 3: three\n").unwrap();
        let json = yaml_to_json(parsed);
        assert_eq!(json["outer"]["2"], "two");
        assert_eq!(json["list"][0]["3"], "three");
    }

    #[test]
    fn test_plist_roundtrip_values() {
        let mut dict = plist::Dictionary::new();
        dict.insert("name".into(), plist::Value::String("Boop".into()));
        dict.insert("count".into(), plist::Value::Integer(3i64.into()));
        dict.insert("enabled".into(), plist::Value::Boolean(true));
        let json = plist_to_json(plist::Value::Dictionary(dict));
        assert_eq!(json["name"], "Boop");
        assert_eq!(json["count"], 3);
        assert_eq!(json["enabled"], true);

        let back = json_to_plist(&json).unwrap();
        match back {
            plist::Value::Dictionary(d) => {
                assert_eq!(d.get("name"), Some(&plist::Value::String("Boop".into())));
            }
            other => panic!("expected dictionary, got {other:?}"),
        }
    }

    #[test]
    fn test_plist_null_rejected() {
        assert!(json_to_plist(&serde_json::Value::Null).is_err());
    }

    #[test]
    fn test_plist_data_becomes_base64() {
        let json = plist_to_json(plist::Value::Data(vec![0x00, 0xFF, 0x10]));
        assert_eq!(json, serde_json::Value::String("AP8Q".to_string()));
    }

    #[test]
    fn test_string_to_bytes_latin1() {
        assert_eq!(string_to_bytes("A\u{00FF}"), vec![0x41, 0xFF]);
    }

    #[test]
    fn test_string_to_bytes_utf8_fallback() {
        assert_eq!(string_to_bytes("é☃"), "é☃".as_bytes().to_vec());
    }
}

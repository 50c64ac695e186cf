// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The `Array` helper
//!
//! Arrays are ordered maps. Operations that produce a new sequence renumber
//! integer keys from zero and keep string keys, the same way list-building
//! operations behave in hash-map-backed scripting languages. Every operation
//! returns a new array; inputs are never modified.

use super::args::{Args, to_number};
use crate::core::Result;
use crate::evaluator::operations::Number;
use crate::model::{EelFunction, EelMap, EelObject, EelValue, MapKey};
use rand::seq::{IteratorRandom, SliceRandom};
use std::cmp::Ordering;
use rustc_hash::FxHashSet;

/// Upper bound of elements generated by `Array.range`
const MAX_RANGE_LENGTH: usize = 1 << 20;

/// Array manipulation functions, exposed as `Array`
#[derive(Debug, Default, Clone, Copy)]
pub struct ArrayHelper;

impl EelObject for ArrayHelper {
    fn type_name(&self) -> &str {
        "Array"
    }

    fn resolve_method(&self, name: &str, args: &[EelValue]) -> Option<Result<EelValue>> {
        let args = Args::new("Array", name, args);
        let result: Result<EelValue> = match name {
            "concat" => Ok(concat(&args)),
            "join" => join(&args),
            "slice" => slice(&args),
            "reverse" => args
                .map(0)
                .map(|array| renumbered(entries(array).rev()).into()),
            "keys" => args
                .map(0)
                .map(|array| EelValue::list(array.keys().map(MapKey::to_value))),
            "length" => args.map(0).map(|array| array.len().into()),
            "isEmpty" => args.map(0).map(|array| array.is_empty().into()),
            "first" => args.map(0).map(|array| {
                array
                    .first()
                    .map_or(EelValue::Boolean(false), |(_, v)| v.clone())
            }),
            "last" => args.map(0).map(|array| {
                array
                    .last()
                    .map_or(EelValue::Boolean(false), |(_, v)| v.clone())
            }),
            "indexOf" => index_of(&args),
            "random" => args.map(0).map(|array| {
                array
                    .values()
                    .choose(&mut rand::thread_rng())
                    .cloned()
                    .unwrap_or(EelValue::Null)
            }),
            "sort" => sort(&args),
            "ksort" => ksort(&args),
            "shuffle" => shuffle(&args),
            "unique" => unique(&args),
            "pop" => args.map(0).map(|array| {
                let mut array = EelMap::clone(array);
                array.pop();
                array.into()
            }),
            "push" => push(&args),
            "shift" => args
                .map(0)
                .map(|array| renumbered(entries(array).skip(1)).into()),
            "unshift" => unshift(&args),
            "splice" => splice(&args),
            "flip" => args.map(0).map(flip),
            "range" => range(&args),
            "set" => set(&args),
            "map" => map(&args),
            "reduce" => reduce(&args),
            "filter" => filter(&args),
            "some" => some_or_every(&args, true),
            "every" => some_or_every(&args, false),
            _ => return None,
        };
        Some(result)
    }

    fn allows_call_of_method(&self, _name: &str) -> bool {
        true
    }
}

fn entries(array: &EelMap) -> impl DoubleEndedIterator<Item = (MapKey, EelValue)> + '_ {
    array.iter().map(|(k, v)| (k.clone(), v.clone()))
}

/// Rebuild a map with integer keys renumbered in order and string keys kept
fn renumbered(entries: impl IntoIterator<Item = (MapKey, EelValue)>) -> EelMap {
    let mut next = 0i64;
    let mut out = EelMap::new();
    for (key, value) in entries {
        match key {
            MapKey::Int(_) => {
                out.insert(MapKey::Int(next), value);
                next += 1;
            }
            key @ MapKey::Str(_) => {
                out.insert(key, value);
            }
        }
    }
    out
}

/// Resolve an offset and optional length against `len` elements into a
/// `start..end` window. Negative offsets count from the end, negative
/// lengths stop that many elements before the end.
fn window(len: usize, offset: i64, length: Option<i64>) -> (usize, usize) {
    let n = len as i64;
    let start = if offset < 0 {
        (n + offset).max(0)
    } else {
        offset.min(n)
    };
    let end = match length {
        None => n,
        Some(l) if l < 0 => (n + l).max(start),
        Some(l) => start.saturating_add(l).min(n),
    };
    (start as usize, end.max(start) as usize)
}

fn concat(args: &Args) -> EelValue {
    let mut parts = Vec::new();
    for value in args.rest(0) {
        match value {
            EelValue::Map(array) => parts.extend(entries(array)),
            scalar => parts.push((MapKey::Int(0), scalar.clone())),
        }
    }
    renumbered(parts).into()
}

fn join(args: &Args) -> Result<EelValue> {
    let array = args.map(0)?;
    let separator = match args.opt_string(1)? {
        Some(separator) => separator,
        None => ",".to_string(),
    };
    let parts = array
        .values()
        .map(|v| v.to_eel_string())
        .collect::<Result<Vec<_>>>()
        .map_err(|_| args.invalid(0, "an array of scalar values"))?;
    Ok(parts.join(&separator).into())
}

fn slice(args: &Args) -> Result<EelValue> {
    let array = args.map(0)?;
    let begin = args.int(1)?;
    let count = array.len() as i64;
    let end = match args.opt_int(2)? {
        None => count,
        Some(end) if end < 0 => count + end,
        Some(end) => end,
    };
    let (start, stop) = window(array.len(), begin, Some(end - begin));
    Ok(renumbered(entries(array).skip(start).take(stop - start)).into())
}

fn index_of(args: &Args) -> Result<EelValue> {
    let array = args.map(0)?;
    let search = args.get(1);
    let (from, _) = window(array.len(), args.opt_int(2)?.unwrap_or(0), None);

    let found = array
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, (_, value))| *value == search);
    Ok(match found {
        Some((_, (MapKey::Int(key), _))) => EelValue::Integer(*key),
        Some((position, _)) => position.into(),
        None => EelValue::Integer(-1),
    })
}

/// Compare two strings treating runs of digits as numbers
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();
    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let left = take_digits(&mut a);
                let right = take_digits(&mut b);
                let (l, r) = (left.trim_start_matches('0'), right.trim_start_matches('0'));
                let ordering = l.len().cmp(&r.len()).then_with(|| l.cmp(r));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                a.next();
                b.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        digits.push(c);
    }
    digits
}

fn sort(args: &Args) -> Result<EelValue> {
    let array = args.map(0)?;
    let mut sorted: Vec<(MapKey, EelValue)> = entries(array).collect();
    sorted.sort_by(|(_, a), (_, b)| natural_cmp(&a.to_string(), &b.to_string()));

    if EelValue::Map(array.clone()).is_list() {
        Ok(EelValue::list(sorted.into_iter().map(|(_, v)| v)))
    } else {
        Ok(sorted.into_iter().collect::<EelMap>().into())
    }
}

fn ksort(args: &Args) -> Result<EelValue> {
    let array = args.map(0)?;
    let mut sorted: Vec<(MapKey, EelValue)> = entries(array).collect();
    sorted.sort_by(|(a, _), (b, _)| {
        natural_cmp(&a.to_string().to_lowercase(), &b.to_string().to_lowercase())
    });
    Ok(sorted.into_iter().collect::<EelMap>().into())
}

fn shuffle(args: &Args) -> Result<EelValue> {
    let array = args.map(0)?;
    let preserve_keys = match args.get(1) {
        EelValue::Null => true,
        value => value.is_truthy(),
    };
    let mut shuffled: Vec<(MapKey, EelValue)> = entries(array).collect();
    shuffled.shuffle(&mut rand::thread_rng());

    if preserve_keys {
        Ok(shuffled.into_iter().collect::<EelMap>().into())
    } else {
        Ok(EelValue::list(shuffled.into_iter().map(|(_, v)| v)))
    }
}

fn unique(args: &Args) -> Result<EelValue> {
    let array = args.map(0)?;
    let mut seen = FxHashSet::default();
    Ok(entries(array)
        .filter(|(_, value)| seen.insert(value.to_string()))
        .collect::<EelMap>()
        .into())
}

fn push(args: &Args) -> Result<EelValue> {
    let mut array = EelMap::clone(args.map(0)?);
    let mut next = array
        .keys()
        .filter_map(|k| match k {
            MapKey::Int(i) => Some(*i),
            MapKey::Str(_) => None,
        })
        .max()
        .map_or(0, |max| max + 1);
    for element in args.rest(1) {
        array.insert(MapKey::Int(next), element.clone());
        next += 1;
    }
    Ok(array.into())
}

fn unshift(args: &Args) -> Result<EelValue> {
    let mut array: Vec<(MapKey, EelValue)> = entries(args.map(0)?).collect();
    for element in args.rest(1) {
        array.insert(0, (MapKey::Int(0), element.clone()));
    }
    Ok(renumbered(array).into())
}

fn splice(args: &Args) -> Result<EelValue> {
    let array = args.map(0)?;
    let offset = args.int(1)?;
    let length = match args.len() {
        0..=2 => Some(1),
        _ => args.opt_int(2)?,
    };
    let (start, end) = window(array.len(), offset, length);

    let all: Vec<(MapKey, EelValue)> = entries(array).collect();
    let replacements = args.rest(3).map(|v| (MapKey::Int(0), v.clone()));
    let spliced = all[..start]
        .iter()
        .cloned()
        .chain(replacements)
        .chain(all[end..].iter().cloned());
    Ok(renumbered(spliced).into())
}

fn flip(array: &std::sync::Arc<EelMap>) -> EelValue {
    array
        .iter()
        .filter_map(|(key, value)| match value {
            EelValue::Integer(i) => Some((MapKey::Int(*i), key.to_value())),
            EelValue::String(s) => Some((MapKey::from_text(s), key.to_value())),
            _ => None,
        })
        .collect::<EelMap>()
        .into()
}

fn range(args: &Args) -> Result<EelValue> {
    let step = match args.get(2) {
        EelValue::Null => Number::Int(1),
        _ => args.number(2)?,
    };
    if step.as_f64() == 0.0 || !step.as_f64().is_finite() {
        return Err(args.invalid(2, "a non-zero step"));
    }

    if let (Some(start), Some(end)) = (letter(args.get(0)), letter(args.get(1))) {
        let step = step.as_f64().abs().max(1.0) as usize;
        let (low, high) = (u32::from(start.min(end)), u32::from(start.max(end)));
        let mut letters: Vec<EelValue> = (low..=high)
            .step_by(step)
            .filter_map(char::from_u32)
            .map(|c| EelValue::from(c.to_string()))
            .collect();
        if start > end {
            letters.reverse();
        }
        return Ok(EelValue::list(letters));
    }

    let start = args.number(0)?;
    let end = args.number(1)?;
    match (start, end, step) {
        (Number::Int(start), Number::Int(end), Number::Int(step)) => {
            let step = step.unsigned_abs();
            let span = start.abs_diff(end);
            let count = usize::try_from(span / step).unwrap_or(usize::MAX).saturating_add(1);
            if count > MAX_RANGE_LENGTH {
                return Err(args.invalid(1, "a range of at most 1048576 elements"));
            }
            let direction: i128 = if start <= end { 1 } else { -1 };
            Ok(EelValue::list((0..count).map(|i| {
                let value = i128::from(start) + direction * i128::from(step) * i as i128;
                EelValue::Integer(value as i64)
            })))
        }
        _ => {
            let (start, end, step) = (start.as_f64(), end.as_f64(), step.as_f64().abs());
            let count = ((end - start).abs() / step).floor() + 1.0;
            if !count.is_finite() || count > MAX_RANGE_LENGTH as f64 {
                return Err(args.invalid(1, "a range of at most 1048576 elements"));
            }
            let step = if start <= end { step } else { -step };
            Ok(EelValue::list(
                (0..count as usize).map(|i| EelValue::Float(start + step * i as f64)),
            ))
        }
    }
}

/// The single character of a non-numeric string used as a range bound
fn letter(value: &EelValue) -> Option<char> {
    match value {
        EelValue::String(s) if to_number(value).is_none() => s.chars().next(),
        _ => None,
    }
}

fn set(args: &Args) -> Result<EelValue> {
    let mut array = EelMap::clone(args.map(0)?);
    let key = MapKey::from_value(args.get(1)).ok_or_else(|| args.invalid(1, "a key"))?;
    array.insert(key, args.get(2).clone());
    Ok(array.into())
}

fn invoke(callback: &EelFunction, key: &MapKey, value: &EelValue) -> Result<EelValue> {
    callback.call(&[value.clone(), key.to_value()])
}

fn map(args: &Args) -> Result<EelValue> {
    let array = args.map(0)?;
    let callback = args.function(1)?;
    array
        .iter()
        .map(|(key, value)| Ok((key.clone(), invoke(callback, key, value)?)))
        .collect::<Result<EelMap>>()
        .map(EelValue::from)
}

fn reduce(args: &Args) -> Result<EelValue> {
    let array = args.map(0)?;
    let callback = args.function(1)?;
    let mut elements = array.iter();

    let mut accumulator = match args.get(2) {
        EelValue::Null => match elements.next() {
            Some((_, first)) => first.clone(),
            None => return Ok(EelValue::Null),
        },
        initial => initial.clone(),
    };
    for (key, value) in elements {
        accumulator = callback.call(&[accumulator, value.clone(), key.to_value()])?;
    }
    Ok(accumulator)
}

fn filter(args: &Args) -> Result<EelValue> {
    let array = args.map(0)?;
    let callback = args.opt_function(1)?;
    let mut kept = EelMap::new();
    for (key, value) in array.iter() {
        let keep = match callback {
            Some(callback) => invoke(callback, key, value)?.is_truthy(),
            None => value.is_truthy(),
        };
        if keep {
            kept.insert(key.clone(), value.clone());
        }
    }
    Ok(kept.into())
}

/// `some` when `any` is set, `every` otherwise
fn some_or_every(args: &Args, any: bool) -> Result<EelValue> {
    let array = args.map(0)?;
    let callback = args.function(1)?;
    for (key, value) in array.iter() {
        if invoke(callback, key, value)?.is_truthy() == any {
            return Ok(any.into());
        }
    }
    Ok((!any).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::{Value as Json, json};

    fn call(method: &str, args: Vec<EelValue>) -> Result<EelValue> {
        ArrayHelper
            .resolve_method(method, &args)
            .unwrap_or_else(|| panic!("unknown method {method}"))
    }

    fn call_json(method: &str, args: Vec<Json>) -> Json {
        call(method, args.into_iter().map(EelValue::from).collect())
            .unwrap()
            .to_json()
    }

    fn callback(f: impl Fn(&[EelValue]) -> Result<EelValue> + Send + Sync + 'static) -> EelValue {
        EelValue::function(f)
    }

    #[rstest]
    #[case(vec![json!([1, 2, 3]), json!([4, 5, 6])], json!([1, 2, 3, 4, 5, 6]))]
    #[case(vec![json!(1), json!([2, 3]), json!(4)], json!([1, 2, 3, 4]))]
    #[case(vec![json!({"a": 1, "0": "x"}), json!({"a": 2, "0": "y"})], json!({"a": 2, "0": "x", "1": "y"}))]
    fn test_concat(#[case] args: Vec<Json>, #[case] expected: Json) {
        assert_eq!(call_json("concat", args), expected);
    }

    #[rstest]
    #[case(vec![json!(["a", "b", "c"])], "a,b,c")]
    #[case(vec![json!(["a", "b", "c"]), json!(", ")], "a, b, c")]
    #[case(vec![json!([1, true, null, 1.5])], "1,true,,1.5")]
    #[case(vec![json!([])], "")]
    fn test_join(#[case] args: Vec<Json>, #[case] expected: &str) {
        assert_eq!(call_json("join", args), json!(expected));
    }

    #[test]
    fn test_join_rejects_nested_arrays() {
        let err = call("join", vec![EelValue::from(json!([[1]]))]).unwrap_err();
        assert_eq!(err.error_code(), &crate::core::error_code::EL0106);
    }

    #[rstest]
    #[case(vec![json!(["a", "b", "c", "d", "e"]), json!(1), json!(-2)], json!(["b", "c"]))]
    #[case(vec![json!(["a", "b", "c", "d", "e"]), json!(1), json!(3)], json!(["b", "c"]))]
    #[case(vec![json!(["a", "b", "c", "d", "e"]), json!(2)], json!(["c", "d", "e"]))]
    #[case(vec![json!(["a", "b", "c", "d", "e"]), json!(-2)], json!(["d", "e"]))]
    #[case(vec![json!(["a", "b", "c"]), json!(2), json!(1)], json!([]))]
    #[case(vec![json!({"foo": "bar", "1": "x", "2": "y"}), json!(1)], json!(["x", "y"]))]
    fn test_slice(#[case] args: Vec<Json>, #[case] expected: Json) {
        assert_eq!(call_json("slice", args), expected);
    }

    #[test]
    fn test_reverse_keys_and_length() {
        assert_eq!(call_json("reverse", vec![json!(["a", "b", "c"])]), json!(["c", "b", "a"]));
        assert_eq!(
            call_json("reverse", vec![json!({"foo": "bar", "bar": "baz"})]),
            json!({"bar": "baz", "foo": "bar"})
        );
        assert_eq!(call_json("keys", vec![json!({"foo": 1, "bar": 2})]), json!(["foo", "bar"]));
        assert_eq!(call_json("keys", vec![json!(["a", "b"])]), json!([0, 1]));
        assert_eq!(call_json("length", vec![json!({"a": 1, "b": 2, "c": 3})]), json!(3));
        assert_eq!(call_json("isEmpty", vec![json!([])]), json!(true));
        assert_eq!(call_json("isEmpty", vec![json!([null])]), json!(false));
    }

    #[test]
    fn test_first_and_last() {
        assert_eq!(call_json("first", vec![json!(["a", "b", "c"])]), json!("a"));
        assert_eq!(call_json("last", vec![json!({"x": 1, "y": 2})]), json!(2));
        assert_eq!(call_json("first", vec![json!([])]), json!(false));
        assert_eq!(call_json("last", vec![json!([])]), json!(false));
    }

    #[rstest]
    #[case(vec![json!(["a", "b", "c", "a"]), json!("a")], 0)]
    #[case(vec![json!(["a", "b", "c", "a"]), json!("a"), json!(2)], 3)]
    #[case(vec![json!(["a", "b", "c"]), json!("z")], -1)]
    #[case(vec![json!([1, "1"]), json!("1")], 1)]
    #[case(vec![json!({"foo": "bar", "baz": "qux"}), json!("qux")], 1)]
    fn test_index_of(#[case] args: Vec<Json>, #[case] expected: i64) {
        assert_eq!(call_json("indexOf", args), json!(expected));
    }

    #[test]
    fn test_random() {
        let value = call_json("random", vec![json!(["a", "b", "c"])]);
        assert!(["a", "b", "c"].iter().any(|v| json!(v) == value));
        assert_eq!(call_json("random", vec![json!([])]), Json::Null);
    }

    #[rstest]
    #[case(json!(["c", "a", "b"]), json!(["a", "b", "c"]))]
    #[case(json!(["img12.png", "img10.png", "img2.png", "img1.png"]), json!(["img1.png", "img2.png", "img10.png", "img12.png"]))]
    #[case(json!([3, 1.5, 10, -1]), json!([-1, 1.5, 3, 10]))]
    #[case(json!({"a": "z", "b": "y"}), json!({"b": "y", "a": "z"}))]
    fn test_sort(#[case] input: Json, #[case] expected: Json) {
        assert_eq!(call_json("sort", vec![input]), expected);
    }

    #[test]
    fn test_ksort() {
        assert_eq!(
            call_json("ksort", vec![json!({"c": 1, "A": 2, "b10": 3, "b9": 4})]),
            json!({"A": 2, "b9": 4, "b10": 3, "c": 1})
        );
    }

    #[test]
    fn test_shuffle_keeps_elements() {
        let shuffled = call("shuffle", vec![EelValue::from(json!({"a": 1, "b": 2, "c": 3}))]).unwrap();
        let map = shuffled.as_map().unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map[&MapKey::from("b")], EelValue::Integer(2));

        let list = call(
            "shuffle",
            vec![EelValue::from(json!({"a": 1, "b": 2})), EelValue::Boolean(false)],
        )
        .unwrap();
        assert!(list.is_list());
    }

    #[test]
    fn test_unique() {
        assert_eq!(
            call_json("unique", vec![json!(["a", "b", "a", 1, "1", "c"])]),
            json!({"0": "a", "1": "b", "3": 1, "5": "c"})
        );
    }

    #[test]
    fn test_pop_push_shift_unshift() {
        assert_eq!(call_json("pop", vec![json!(["a", "b", "c"])]), json!(["a", "b"]));
        assert_eq!(call_json("pop", vec![json!([])]), json!([]));
        assert_eq!(
            call_json("push", vec![json!(["a", "b"]), json!("c"), json!("d")]),
            json!(["a", "b", "c", "d"])
        );
        assert_eq!(
            call_json("push", vec![json!({"foo": "bar", "5": "x"}), json!("y")]),
            json!({"foo": "bar", "5": "x", "6": "y"})
        );
        assert_eq!(call_json("shift", vec![json!(["a", "b", "c"])]), json!(["b", "c"]));
        assert_eq!(
            call_json("unshift", vec![json!(["c"]), json!("b"), json!("a")]),
            json!(["a", "b", "c"])
        );
    }

    #[rstest]
    #[case(vec![json!(["z", "7d", "i", "7"]), json!(2), json!(2), json!(42), json!("abc"), json!("Neos")], json!(["z", "7d", 42, "abc", "Neos"]))]
    #[case(vec![json!(["a", "b", "c"]), json!(1)], json!(["a", "c"]))]
    #[case(vec![json!(["a", "b", "c"]), json!(-1), json!(1), json!("x")], json!(["a", "b", "x"]))]
    #[case(vec![json!(["a", "b", "c"]), json!(1), json!(0), json!("x")], json!(["a", "x", "b", "c"]))]
    fn test_splice(#[case] args: Vec<Json>, #[case] expected: Json) {
        assert_eq!(call_json("splice", args), expected);
    }

    #[test]
    fn test_flip_and_set() {
        assert_eq!(
            call_json("flip", vec![json!({"a": "x", "b": 2, "c": [1]})]),
            json!({"x": "a", "2": "b"})
        );
        assert_eq!(
            call_json("set", vec![json!({"a": 1}), json!("b"), json!(2)]),
            json!({"a": 1, "b": 2})
        );
        assert_eq!(call_json("set", vec![json!(["x"]), json!(0), json!("y")]), json!(["y"]));
    }

    #[rstest]
    #[case(vec![json!(1), json!(4)], json!([1, 2, 3, 4]))]
    #[case(vec![json!(0), json!(10), json!(5)], json!([0, 5, 10]))]
    #[case(vec![json!(3), json!(1)], json!([3, 2, 1]))]
    #[case(vec![json!(0), json!(1), json!(0.25)], json!([0.0, 0.25, 0.5, 0.75, 1.0]))]
    #[case(vec![json!("a"), json!("e"), json!(2)], json!(["a", "c", "e"]))]
    #[case(vec![json!("c"), json!("a")], json!(["c", "b", "a"]))]
    fn test_range(#[case] args: Vec<Json>, #[case] expected: Json) {
        assert_eq!(call_json("range", args), expected);
    }

    #[test]
    fn test_range_rejects_zero_step() {
        let err = call("range", vec![EelValue::Integer(1), EelValue::Integer(5), EelValue::Integer(0)])
            .unwrap_err();
        assert_eq!(err.error_code(), &crate::core::error_code::EL0106);
    }

    #[test]
    fn test_map_reduce_filter() {
        let double = callback(|args: &[EelValue]| {
            Ok(EelValue::Integer(args[0].as_integer().unwrap_or(0) * 2))
        });
        assert_eq!(
            call("map", vec![EelValue::from(json!({"a": 1, "b": 2})), double])
                .unwrap()
                .to_json(),
            json!({"a": 2, "b": 4})
        );

        let key_of = callback(|args: &[EelValue]| Ok(args[1].clone()));
        assert_eq!(
            call("map", vec![EelValue::from(json!(["x", "y"])), key_of]).unwrap().to_json(),
            json!([0, 1])
        );

        let sum = callback(|args: &[EelValue]| {
            Ok(EelValue::Integer(
                args[0].as_integer().unwrap_or(0) + args[1].as_integer().unwrap_or(0),
            ))
        });
        let numbers = EelValue::from(json!([1, 2, 3, 4]));
        assert_eq!(call("reduce", vec![numbers.clone(), sum.clone()]).unwrap(), EelValue::Integer(10));
        assert_eq!(
            call("reduce", vec![numbers, sum.clone(), EelValue::Integer(5)]).unwrap(),
            EelValue::Integer(15)
        );
        assert_eq!(call("reduce", vec![EelValue::empty_map(), sum]).unwrap(), EelValue::Null);

        let even = callback(|args: &[EelValue]| Ok(EelValue::Boolean(args[0].as_integer().unwrap_or(1) % 2 == 0)));
        assert_eq!(
            call("filter", vec![EelValue::from(json!([1, 2, 3, 4])), even]).unwrap().to_json(),
            json!({"1": 2, "3": 4})
        );
        assert_eq!(
            call("filter", vec![EelValue::from(json!([0, "a", "", null, 2]))]).unwrap().to_json(),
            json!({"1": "a", "4": 2})
        );
    }

    #[test]
    fn test_some_and_every() {
        let positive = callback(|args: &[EelValue]| Ok(EelValue::Boolean(args[0].as_integer().unwrap_or(0) > 0)));
        let mixed = EelValue::from(json!([1, -2, 3]));
        let all_positive = EelValue::from(json!([1, 2, 3]));
        assert_eq!(call("some", vec![mixed.clone(), positive.clone()]).unwrap(), EelValue::Boolean(true));
        assert_eq!(call("every", vec![mixed, positive.clone()]).unwrap(), EelValue::Boolean(false));
        assert_eq!(call("every", vec![all_positive, positive.clone()]).unwrap(), EelValue::Boolean(true));
        assert_eq!(call("some", vec![EelValue::empty_map(), positive.clone()]).unwrap(), EelValue::Boolean(false));
        assert_eq!(call("every", vec![EelValue::empty_map(), positive]).unwrap(), EelValue::Boolean(true));
    }

    #[test]
    fn test_callback_errors_propagate() {
        let failing = callback(|_: &[EelValue]| {
            Err(crate::core::EelError::evaluation_error(
                crate::core::error_code::EL0103,
                "boom",
            ))
        });
        let err = call("map", vec![EelValue::from(json!([1])), failing]).unwrap_err();
        assert_eq!(err.error_code(), &crate::core::error_code::EL0103);
        assert!(call("map", vec![EelValue::from(json!([1])), EelValue::Integer(1)]).is_err());
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("img2", "img10"), Ordering::Less);
        assert_eq!(natural_cmp("a", "b"), Ordering::Less);
        assert_eq!(natural_cmp("x10y", "x10z"), Ordering::Less);
        assert_eq!(natural_cmp("007", "7"), Ordering::Equal);
    }
}

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

//! String, Array and Math helpers called from expressions

use eel::core::error_code::{EL0101, EL0106, EL0107};
use eel::{EelEngine, EelError, EelValue, EvaluationMode};
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};
use serde_json::{Value, json};

#[fixture]
fn engine() -> EelEngine {
    EelEngine::new()
}

fn data() -> Value {
    json!({
        "title": "Hello, World!",
        "date": "2016-08-31",
        "numbers": [4, 1, 3, 2],
        "people": [
            {"name": "Ada", "age": 36},
            {"name": "Grace", "age": 85},
            {"name": "Linus", "age": 28}
        ],
        "tags": {"b": "beta", "a": "alpha"}
    })
}

/// Evaluate in both modes and return the shared result as JSON
fn eval(engine: &EelEngine, expression: &str) -> Value {
    let context = engine.context(data());
    let interpreted = engine
        .evaluate(expression, &context, EvaluationMode::Interpret)
        .unwrap_or_else(|e| panic!("'{expression}' failed: {e}"));
    let compiled = engine
        .evaluate(expression, &context, EvaluationMode::Compile)
        .unwrap_or_else(|e| panic!("'{expression}' failed compiled: {e}"));
    assert_eq!(interpreted, compiled, "modes disagree on '{expression}'");
    interpreted.to_json()
}

fn eval_err(engine: &EelEngine, expression: &str) -> EelError {
    let context = engine.context(data());
    let interpreted = engine
        .evaluate(expression, &context, EvaluationMode::Interpret)
        .unwrap_err();
    let compiled = engine
        .evaluate(expression, &context, EvaluationMode::Compile)
        .unwrap_err();
    assert_eq!(interpreted, compiled);
    interpreted
}

#[rstest]
#[case("String.substr(title, 7, 5)", json!("World"))]
#[case("String.substring(title, 12, 7)", json!("World"))]
#[case("String.charAt(title, 5)", json!(","))]
#[case("String.indexOf(title, 'World')", json!(7))]
#[case("String.lastIndexOf('canal', 'a')", json!(3))]
#[case("String.startsWith(title, 'Hello')", json!(true))]
#[case("String.endsWith(title, 'World!')", json!(true))]
#[case("String.toUpperCase('öl') + String.toLowerCase('ABC')", json!("ÖLabc"))]
#[case("String.firstLetterToUpperCase('eel')", json!("Eel"))]
#[case("String.firstLetterToLowerCase('Eel')", json!("eel"))]
#[case("String.length('Bär')", json!(3))]
#[case("String.trim('  padded  ')", json!("padded"))]
#[case("String.isBlank('   ')", json!(true))]
#[case("String.replace('My hovercraft is full of eels', 'eels', 'spaghetti')", json!("My hovercraft is full of spaghetti"))]
#[case("String.split('a,b,c', ',')", json!(["a", "b", "c"]))]
#[case("String.pregReplace(date, '/([0-9]+)-([0-9]+)-([0-9]+)/', '$3.$2.$1')", json!("31.08.2016"))]
#[case("String.pregMatch(date, '/([0-9]+)-([0-9]+)/')", json!(["2016-08", "2016", "08"]))]
#[case("String.pregMatch(date, '/x/')", json!(null))]
#[case("String.pregSplit('a1b22c', '/[0-9]+/')", json!(["a", "b", "c"]))]
#[case("String.stripTags('<b>bold</b> text')", json!("bold text"))]
#[case("String.nl2br('a\nb')", json!("a<br />\nb"))]
#[case("String.toString(true)", json!("true"))]
#[case("String.toInteger('42') + 1", json!(43))]
#[case("String.toFloat('1.5kg')", json!(1.5))]
#[case("String.toBoolean('TRUE')", json!(true))]
#[case("String.rawUrlEncode('a b&c')", json!("a%20b%26c"))]
#[case("String.rawUrlDecode('a%20b')", json!("a b"))]
#[case("String.htmlSpecialChars('<a>')", json!("&lt;a&gt;"))]
#[case("String.cropAtWord('Kasper Skårhøj implemented the original version of the crop function', 18, '...')", json!("Kasper Skårhøj ..."))]
#[case("String.crop('Kasper', 18, '...')", json!("Kasper"))]
#[case("String.cropAtSentence('Kasper Skårhøj implemented the original version of the crop function. But now we are using a TextIterator. Not too bad either.', 80, '...')", json!("Kasper Skårhøj implemented the original version of the crop function. ..."))]
#[case("String.chr(65)", json!("A"))]
#[case("String.chr(256)", json!("\u{0}"))]
#[case("String.ord('A')", json!(65))]
#[case("String.ord('')", json!(0))]
#[case("String.ord(1)", json!(49))]
#[case("String.ord('longer string')", json!(108))]
#[case("String.md5('joh316')", json!("bacb98acf97e0b6112b1d1b650b84971"))]
#[case("String.sha1('joh316')", json!("063b3d108bed9f88fa618c6046de0dccadcf3158"))]
#[case("String.format('%s has %d items', ['cart', 3])", json!("cart has 3 items"))]
#[case("String.format('%2$s before %1$s', [people[0].name, people[1].name])", json!("Grace before Ada"))]
#[case("String.format('[%-6s|%06.2f|%x]', [date, 3.14159 * 2, 255])", json!("[2016-08-31|006.28|ff]"))]
#[case("String.wordCount(title)", json!(2))]
#[case("String.base64decode(String.base64encode('eel'))", json!("eel"))]
#[case("String.sha256('')", json!("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"))]
fn test_string_helper(engine: EelEngine, #[case] expression: &str, #[case] expected: Value) {
    assert_eq!(eval(&engine, expression), expected, "{expression}");
}

#[rstest]
#[case("Array.length(numbers)", json!(4))]
#[case("Array.join(Array.sort(numbers), '-')", json!("1-2-3-4"))]
#[case("Array.reverse(numbers)", json!([2, 3, 1, 4]))]
#[case("Array.concat(numbers, [5], 6)", json!([4, 1, 3, 2, 5, 6]))]
#[case("Array.slice(numbers, 1, 3)", json!([1, 3]))]
#[case("Array.first(numbers) + Array.last(numbers)", json!(6))]
#[case("Array.first([])", json!(false))]
#[case("Array.indexOf(numbers, 3)", json!(2))]
#[case("Array.keys(tags)", json!(["b", "a"]))]
#[case("Array.ksort(tags)", json!({"a": "alpha", "b": "beta"}))]
#[case("Array.isEmpty([])", json!(true))]
#[case("Array.unique([1, 1, 2])", json!({"0": 1, "2": 2}))]
#[case("Array.push(numbers, 5)", json!([4, 1, 3, 2, 5]))]
#[case("Array.pop(numbers)", json!([4, 1, 3]))]
#[case("Array.shift(numbers)", json!([1, 3, 2]))]
#[case("Array.unshift(numbers, 0)", json!([0, 4, 1, 3, 2]))]
#[case("Array.range(1, 5, 2)", json!([1, 3, 5]))]
#[case("Array.set(tags, 'c', 'gamma')", json!({"b": "beta", "a": "alpha", "c": "gamma"}))]
#[case("Array.flip(['x', 'y'])", json!({"x": 0, "y": 1}))]
fn test_array_helper(engine: EelEngine, #[case] expression: &str, #[case] expected: Value) {
    assert_eq!(eval(&engine, expression), expected, "{expression}");
}

#[rstest]
#[case("Array.map(numbers, x => x * 2)", json!([8, 2, 6, 4]))]
#[case("Array.map(people, p => p.name)", json!(["Ada", "Grace", "Linus"]))]
#[case("Array.map(['a', 'b'], (value, key) => key + ':' + value)", json!(["0:a", "1:b"]))]
#[case("Array.filter(people, p => p.age > 30)", json!([{"name": "Ada", "age": 36}, {"name": "Grace", "age": 85}]))]
#[case("Array.filter(numbers, x => x > 2)", json!({"0": 4, "2": 3}))]
#[case("Array.reduce(numbers, (sum, x) => sum + x)", json!(10))]
#[case("Array.reduce(numbers, (sum, x) => sum + x, 100)", json!(110))]
#[case("Array.reduce(people, (names, p) => names + p.name, '')", json!("AdaGraceLinus"))]
#[case("Array.some(people, p => p.age > 80)", json!(true))]
#[case("Array.every(people, p => p.age > 30)", json!(false))]
#[case("Array.join(Array.map(Array.filter(people, p => p.age < 40), p => String.toUpperCase(p.name)), ', ')", json!("ADA, LINUS"))]
fn test_arrow_function_callbacks(engine: EelEngine, #[case] expression: &str, #[case] expected: Value) {
    assert_eq!(eval(&engine, expression), expected, "{expression}");
}

#[rstest]
#[case("Math.PI > 3.14 && Math.PI < 3.15", json!(true))]
#[case("Math.abs(-4)", json!(4))]
#[case("Math.max(1, 7, 3)", json!(7))]
#[case("Math.min(numbers)", json!(1))]
#[case("Math.pow(2, 10)", json!(1024))]
#[case("Math.round(2.5)", json!(3.0))]
#[case("Math.round(1.005, 2)", json!(1.0))]
#[case("Math.floor(2.7)", json!(2.0))]
#[case("Math.ceil(2.1)", json!(3.0))]
#[case("Math.sqrt(16)", json!(4.0))]
#[case("Math.hypot(3, 4)", json!(5.0))]
#[case("Math.sign(-3)", json!(-1))]
#[case("Math.isNaN(Math.sqrt(-1))", json!(true))]
#[case("Math.isFinite(1 / 3)", json!(true))]
#[case("Math.trunc(-4.7)", json!(-4.0))]
fn test_math_helper(engine: EelEngine, #[case] expression: &str, #[case] expected: Value) {
    assert_eq!(eval(&engine, expression), expected, "{expression}");
}

#[rstest]
fn test_random_values_stay_in_range(engine: EelEngine) {
    for _ in 0..50 {
        let value = eval(&engine, "Math.randomInt(1, 6)").as_i64().unwrap();
        assert!((1..=6).contains(&value));
        let random = eval(&engine, "Math.random()").as_f64().unwrap();
        assert!((0.0..1.0).contains(&random));
        let element = eval(&engine, "Array.random(numbers)").as_i64().unwrap();
        assert!((1..=4).contains(&element));
    }
    let shuffled = eval(&engine, "Array.length(Array.shuffle(numbers))");
    assert_eq!(shuffled, json!(4));
}

#[rstest]
#[case::unknown_method("String.reverse(title)", EL0101)]
#[case::unknown_math("Math.cube(2)", EL0101)]
#[case::bad_argument("Array.join('not an array')", EL0106)]
#[case::zero_step("Array.range(1, 5, 0)", EL0106)]
#[case::bad_callback("Array.map(numbers, 'x')", EL0106)]
#[case::bad_regex("String.pregMatch(title, '/(/')", EL0107)]
#[case::missing_delimiter("String.pregMatch(title, 'abc')", EL0107)]
#[case::format_missing_argument("String.format('%s and %s', ['one'])", EL0106)]
#[case::format_unknown_specifier("String.format('%q', [1])", EL0106)]
#[case::format_without_array("String.format('%s', title)", EL0106)]
fn test_helper_errors(engine: EelEngine, #[case] expression: &str, #[case] code: eel::ErrorCode) {
    let error = eval_err(&engine, expression);
    assert_eq!(error.error_code(), &code, "{expression}: {error}");
}

#[rstest]
fn test_data_shadows_helper_names(engine: EelEngine) {
    let result = engine
        .evaluate_json("String + 1", json!({"String": 41}))
        .unwrap();
    assert_eq!(result, EelValue::Integer(42));
}

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

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use eel::parser::Tokenizer;
use eel::{
    CompilingEvaluator, EelEngine, Evaluator, InterpretingEvaluator, NullExpressionCache,
    is_expression, parse,
};
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;

const EXPRESSIONS: &[(&str, &str)] = &[
    ("literal", "42"),
    ("arithmetic", "1 + 2 * 3 + 4 / 2 + 2"),
    ("path", "site.settings.title"),
    ("logic", "user.active && user.age >= 18 || user.admin"),
    ("ternary", "items[0] > 2 ? 'many' : 'few'"),
    ("helpers", "String.toUpperCase(String.substr(site.settings.title, 0, 5))"),
    ("arrow", "Array.reduce(Array.map(items, x => x * 2), (sum, x) => sum + x, 0)"),
];

fn benchmark_tokenizer(c: &mut Criterion) {
    let expression = EXPRESSIONS[6].1;

    c.bench_function("tokenizer", |b| {
        b.iter(|| {
            let mut tokenizer = Tokenizer::new(black_box(expression));
            black_box(tokenizer.tokenize_all())
        })
    });
}

fn benchmark_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");
    for (name, expression) in EXPRESSIONS {
        group.bench_with_input(BenchmarkId::from_parameter(name), expression, |b, expr| {
            b.iter(|| black_box(parse(black_box(expr))))
        });
    }
    group.finish();
}

fn benchmark_evaluators(c: &mut Criterion) {
    let engine = EelEngine::new();
    let context = engine.context(json!({
        "site": {"settings": {"title": "Hello World"}},
        "user": {"active": true, "age": 36, "admin": false},
        "items": [3, 1, 4, 1, 5, 9, 2, 6]
    }));

    let interpreter = InterpretingEvaluator::new();
    let compiler = CompilingEvaluator::new();
    let uncached = CompilingEvaluator::with_cache(Arc::new(NullExpressionCache::new()));

    let mut group = c.benchmark_group("evaluate");
    for (name, expression) in EXPRESSIONS {
        group.bench_with_input(BenchmarkId::new("interpreter", name), expression, |b, expr| {
            b.iter(|| black_box(interpreter.evaluate(black_box(expr), &context)))
        });
        group.bench_with_input(BenchmarkId::new("compiled_cached", name), expression, |b, expr| {
            b.iter(|| black_box(compiler.evaluate(black_box(expr), &context)))
        });
        group.bench_with_input(BenchmarkId::new("compiled_uncached", name), expression, |b, expr| {
            b.iter(|| black_box(uncached.evaluate(black_box(expr), &context)))
        });
    }
    group.finish();
}

fn benchmark_recognizer(c: &mut Criterion) {
    let wrapped = format!("${{{}}}", EXPRESSIONS[5].1);
    let malformed = format!("${{{}", "{'".repeat(10_000));

    let mut group = c.benchmark_group("recognizer");
    group.bench_function("wrapped", |b| b.iter(|| black_box(is_expression(black_box(&wrapped)))));
    group.bench_function("malformed", |b| {
        b.iter(|| black_box(is_expression(black_box(&malformed))))
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_tokenizer,
    benchmark_parser,
    benchmark_evaluators,
    benchmark_recognizer
);
criterion_main!(benches);

//! Compiling small spreadsheets and evaluating them through the engine

use formcomp::prelude::*;
use formcomp::CompilerResult;
use formcomp_compiler::{ExprNode, Operator};
use pretty_assertions::assert_eq;

fn numeric_slots(names: &[&str]) -> Shape {
    names
        .iter()
        .fold(Shape::new(), |shape, name| shape.value(*name, DataType::Numeric))
}

fn config(numeric: &str) -> CompilerConfig {
    CompilerConfig::default().with_numeric_type(numeric.parse().unwrap())
}

#[test]
fn test_sum_of_two_inputs_on_every_numeric_type() {
    let mut book = Spreadsheet::new();
    let sheet = book.sheet_mut(0).unwrap();
    sheet.set_cell_value("A1", 1.0).unwrap();
    sheet.set_cell_value("B1", 2.0).unwrap();
    sheet.set_cell_formula("C1", "=SUM(A1:B1)").unwrap();

    for numeric in ["double", "decimal", "decimal:4", "scaled:2", "scaled:6"] {
        let mut builder = EngineBuilder::with_config(
            &book,
            numeric_slots(&["a", "b"]),
            Shape::new()
                .value("total", DataType::Numeric)
                .value("label", DataType::String),
            config(numeric),
        )
        .unwrap();
        builder.input("A1", "a").unwrap().input("B1", "b").unwrap();
        builder.output("C1", "total").unwrap().output("C1", "label").unwrap();
        let engine = builder.build().unwrap();

        let inputs = Record::new().with("a", 1.0).with("b", 2.0);
        let computation = engine.computation(&inputs);
        assert_eq!(computation.get("total").unwrap().to_f64(), Some(3.0), "{}", numeric);
        assert_eq!(computation.get("label").unwrap(), Value::text("3"), "{}", numeric);
    }
}

#[test]
fn test_max_operator_and_aggregate_agree() {
    let mut book = Spreadsheet::new();
    let sheet = book.sheet_mut(0).unwrap();
    sheet.set_cell_value("A1", 0.1).unwrap();
    sheet.set_cell_value("B1", 0.05).unwrap();
    sheet.set_cell_formula("C1", "=MAX(A1,B1)").unwrap();
    sheet.set_cell_formula("D1", "=MAX(A1:B1)").unwrap();

    for numeric in ["double", "decimal:2", "scaled:2"] {
        let mut builder = EngineBuilder::with_config(
            &book,
            numeric_slots(&["a", "b"]),
            Shape::new()
                .value("RebateOp", DataType::String)
                .value("RebateAgg", DataType::String),
            config(numeric),
        )
        .unwrap();
        builder.input("A1", "a").unwrap().input("B1", "b").unwrap();
        builder.output("C1", "RebateOp").unwrap();
        builder.output("D1", "RebateAgg").unwrap();
        let engine = builder.build().unwrap();

        let inputs = Record::new().with("a", 0.1).with("b", 0.05);
        let computation = engine.computation(&inputs);
        assert_eq!(computation.get("RebateOp").unwrap(), Value::text("0.1"));
        assert_eq!(computation.get("RebateAgg").unwrap(), Value::text("0.1"));
    }
}

#[test]
fn test_average_is_rewritten_into_fold_and_count() {
    let mut book = Spreadsheet::new();
    let sheet = book.sheet_mut(0).unwrap();
    sheet.set_cell_value("A1", 1.0).unwrap();
    sheet.set_cell_value("A2", 2.0).unwrap();
    sheet.set_cell_value("A3", 4.0).unwrap();
    sheet.set_cell_formula("A4", "=AVERAGE(A1:A3)").unwrap();

    let outputs = Shape::new()
        .value("avg", DataType::Numeric)
        .value("text", DataType::String);
    let unfolded = config("double")
        .with_constant_folding(false)
        .with_inlining(false);
    let mut builder = EngineBuilder::with_config(&book, Shape::new(), outputs.clone(), unfolded)
        .unwrap();
    builder.output("A4", "avg").unwrap();
    let model = builder.compile().unwrap();
    let described = model.describe();
    assert!(
        described.contains(
            "A4 = (fold(acc__1 = 0, x__1: (acc__1 + x__1) over {A1; A2; A3}) / count({A1; A2; A3}))"
        ),
        "{}",
        described
    );

    let expected = [
        ("double", "2.3333333333333335"),
        ("decimal:4", "2.3333"),
        ("scaled:4", "2.3333"),
    ];
    for (numeric, text) in expected {
        let mut builder =
            EngineBuilder::with_config(&book, Shape::new(), outputs.clone(), config(numeric))
                .unwrap();
        builder.output("A4", "avg").unwrap().output("A4", "text").unwrap();
        let engine = builder.build().unwrap();
        let record = Record::new();
        let computation = engine.computation(&record);
        assert_eq!(computation.get("text").unwrap(), Value::text(text), "{}", numeric);
        let avg = computation.get("avg").unwrap().to_f64().unwrap();
        assert!((avg - 7.0 / 3.0).abs() < 1e-4, "{}: {}", numeric, avg);
    }
}

#[test]
fn test_literals_keep_their_digits() {
    let mut book = Spreadsheet::new();
    let sheet = book.sheet_mut(0).unwrap();
    sheet.set_cell_formula("A1", "=1.2345678901234567891").unwrap();
    sheet.set_cell_formula("B1", "=12345678901234567891+1").unwrap();

    let expected = [
        ("decimal", "1.2345678901234567891", Some("12345678901234567892")),
        ("decimal:4", "1.2346", Some("12345678901234567892")),
        ("scaled:6", "1.234568", None),
        ("scaled:0", "1", None),
    ];
    for (numeric, a1, b1) in expected {
        let mut outputs = Shape::new().value("a", DataType::String);
        if b1.is_some() {
            outputs = outputs.value("b", DataType::String);
        }
        let mut builder =
            EngineBuilder::with_config(&book, Shape::new(), outputs, config(numeric)).unwrap();
        builder.output("A1", "a").unwrap();
        if b1.is_some() {
            builder.output("B1", "b").unwrap();
        }
        let engine = builder.build().unwrap();
        let record = Record::new();
        let computation = engine.computation(&record);
        assert_eq!(computation.get("a").unwrap(), Value::text(a1), "{}", numeric);
        if let Some(b1) = b1 {
            assert_eq!(computation.get("b").unwrap(), Value::text(b1), "{}", numeric);
        }
    }

    let mut builder = EngineBuilder::new(&book, Shape::new(), numeric_slots(&["a"])).unwrap();
    builder.output("A1", "a").unwrap();
    let value = builder.build().unwrap().computation(&Record::new()).get("a").unwrap();
    assert!((value.to_f64().unwrap() - 1.2345678901234567).abs() < 1e-15);
}

#[test]
fn test_large_constant_exponents_fold_quickly() {
    let mut book = Spreadsheet::new();
    let sheet = book.sheet_mut(0).unwrap();
    sheet.set_cell_formula("A1", "=1^4000000000").unwrap();
    sheet.set_cell_formula("B1", "=0.5^4000000000").unwrap();

    for numeric in ["double", "decimal:4", "scaled:4"] {
        let mut builder =
            EngineBuilder::with_config(&book, Shape::new(), numeric_slots(&["a", "b"]), config(numeric))
                .unwrap();
        builder.output("A1", "a").unwrap().output("B1", "b").unwrap();
        let engine = builder.build().unwrap();
        let record = Record::new();
        let computation = engine.computation(&record);
        assert_eq!(computation.get("a").unwrap().to_f64(), Some(1.0), "{}", numeric);
        assert_eq!(computation.get("b").unwrap().to_f64(), Some(0.0), "{}", numeric);
    }
}

#[test]
fn test_repeated_operand_is_shared() {
    let mut book = Spreadsheet::new();
    let sheet = book.sheet_mut(0).unwrap();
    sheet.set_cell_value("A1", 0.0).unwrap();
    sheet.set_cell_formula("B1", "=A1+A1").unwrap();

    let build = || {
        let mut builder =
            EngineBuilder::new(&book, numeric_slots(&["a"]), numeric_slots(&["b"])).unwrap();
        builder.input("A1", "a").unwrap().output("B1", "b").unwrap();
        builder
    };

    let model = build().compile().unwrap();
    let cell = model.output_cell(model.root(), "b").unwrap();
    let root = model.cell(cell).expression.unwrap();
    match model.expr(root) {
        ExprNode::Operator {
            op: Operator::Plus,
            args,
        } => assert_eq!(args[0], args[1]),
        other => panic!("unexpected node {:?}", other),
    }

    let engine = build().build().unwrap();
    for a in [0.0, 1.5, -4.0] {
        let inputs = Record::new().with("a", a);
        assert_eq!(
            engine.computation(&inputs).get("b").unwrap(),
            Value::from(2.0 * a)
        );
    }
}

#[test]
fn test_circular_references_are_rejected() {
    let mut book = Spreadsheet::new();
    let sheet = book.sheet_mut(0).unwrap();
    sheet.set_cell_formula("A1", "=B1+1").unwrap();
    sheet.set_cell_formula("B1", "=C1*2").unwrap();
    sheet.set_cell_formula("C1", "=A1").unwrap();
    sheet.set_cell_formula("D1", "=D1").unwrap();

    for cell in ["A1", "D1"] {
        let mut builder = EngineBuilder::new(&book, Shape::new(), numeric_slots(&["x"])).unwrap();
        builder.output(cell, "x").unwrap();
        let err = builder.build().unwrap_err();
        assert!(
            matches!(err.root_cause(), CompilerError::CyclicReference(_)),
            "{}",
            err
        );
    }
}

/// Items with a price each; each line's amount is `price * rate`, the total sums the lines
fn order_book() -> Spreadsheet {
    let mut book = Spreadsheet::new();
    let sheet = book.sheet_mut(0).unwrap();
    sheet.set_cell_value("D1", 0.5).unwrap();
    for row in 2..=4 {
        sheet.set_cell_value(&format!("A{}", row), 1.0).unwrap();
        sheet
            .set_cell_formula(&format!("B{}", row), &format!("=A{}*$D$1", row))
            .unwrap();
    }
    sheet.set_cell_formula("D2", "=SUM(B2:B4)").unwrap();
    sheet.set_cell_formula("D3", "=COUNT(A2:A4)").unwrap();
    book
}

fn order_engine(book: &Spreadsheet) -> CompilerResult<Engine> {
    let inputs = Shape::new()
        .value("rate", DataType::Numeric)
        .section("items", numeric_slots(&["price"]));
    let outputs = Shape::new()
        .value("total", DataType::Numeric)
        .value("count", DataType::Numeric)
        .section("lines", numeric_slots(&["amount"]));

    let mut builder = EngineBuilder::new(book, inputs, outputs)?;
    let root = builder.root();
    let items =
        builder.repeating_section(root, "A2:B4", Orientation::Vertical, "items", Some("lines"))?;
    builder
        .section_input(items, "A2", "price")?
        .section_output(items, "B2", "amount")?;
    builder
        .input("D1", "rate")?
        .output("D2", "total")?
        .output("D3", "count")?;
    builder.build()
}

#[test]
fn test_repeating_section() {
    let book = order_book();
    let engine = order_engine(&book).unwrap();

    let prices = [2.0, 4.0, 6.0, 10.0];
    let inputs = Record::new().with("rate", 0.5).with_rows(
        "items",
        prices
            .iter()
            .map(|p| Record::new().with("price", *p))
            .collect(),
    );
    let computation = engine.computation(&inputs);
    assert_eq!(computation.get("total").unwrap(), Value::from(11.0));
    assert_eq!(computation.get("count").unwrap(), Value::from(4.0));

    let amounts: Vec<_> = computation
        .rows("lines")
        .unwrap()
        .iter()
        .map(|row| row.get("amount").unwrap())
        .collect();
    assert_eq!(
        amounts,
        vec![
            Value::from(1.0),
            Value::from(2.0),
            Value::from(3.0),
            Value::from(5.0)
        ]
    );

    let empty = Record::new().with("rate", 0.5);
    let computation = engine.computation(&empty);
    assert_eq!(computation.get("total").unwrap(), Value::from(0.0));
    assert!(computation.rows("lines").unwrap().is_empty());
}

#[test]
fn test_defined_names_bind_by_name() {
    let mut book = Spreadsheet::new();
    let sheet = book.sheet_mut(0).unwrap();
    sheet.set_cell_value("A1", 0.0).unwrap();
    sheet.set_cell_value("A2", 0.0).unwrap();
    sheet.set_cell_formula("A3", "=ROUND(Price*Quantity, 1)").unwrap();
    book.define_name("Price", "A1").unwrap();
    book.define_name("Quantity", "A2").unwrap();
    book.define_name("Total", "A3").unwrap();

    let mut builder = EngineBuilder::new(
        &book,
        numeric_slots(&["price", "quantity"]),
        numeric_slots(&["total"]),
    )
    .unwrap();
    assert_eq!(builder.bind_all_by_name().unwrap(), 3);
    let engine = builder.build().unwrap();

    let inputs = Record::new().with("price", 2.25).with("quantity", 3.0);
    assert_eq!(engine.computation(&inputs).get("total").unwrap(), Value::from(6.8));
}

#[test]
fn test_runtime_errors_name_the_cell() {
    let mut book = Spreadsheet::new();
    let sheet = book.sheet_mut(0).unwrap();
    sheet.set_cell_value("A1", 1.0).unwrap();
    sheet.set_cell_formula("B1", "=1/A1").unwrap();

    let mut builder =
        EngineBuilder::new(&book, numeric_slots(&["a"]), numeric_slots(&["b"])).unwrap();
    builder.input("A1", "a").unwrap().output("B1", "b").unwrap();
    let engine = builder.build().unwrap();

    let inputs = Record::new().with("a", 0.0);
    let err = engine.computation(&inputs).get("b").unwrap_err();
    assert_eq!(err.to_string(), "Division by zero (in cell B1)");
}

#[test]
fn test_unsupported_expression_names_the_cell() {
    let mut book = Spreadsheet::new();
    let sheet = book.sheet_mut(0).unwrap();
    sheet.set_cell_formula("A1", "=IF(1)").unwrap();

    let mut builder = EngineBuilder::new(&book, Shape::new(), numeric_slots(&["x"])).unwrap();
    builder.output("A1", "x").unwrap();
    let err = builder.build().unwrap_err();
    assert!(err.to_string().ends_with("(in cell A1)"), "{}", err);
}

#[test]
fn test_variance_and_deviation() {
    let mut book = Spreadsheet::new();
    let sheet = book.sheet_mut(0).unwrap();
    for (row, value) in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].iter().enumerate() {
        sheet.set_cell_value(&format!("A{}", row + 1), *value).unwrap();
    }
    sheet.set_cell_formula("B1", "=VARP(A1:A8)").unwrap();
    sheet.set_cell_formula("B2", "=VAR(A1:A8)").unwrap();
    sheet.set_cell_formula("B3", "=STDEVP(A1:A8)").unwrap();
    sheet.set_cell_formula("B4", "=STDEV(A1:A8)").unwrap();
    sheet.set_cell_formula("B5", "=VAR(3)").unwrap();

    let outputs = numeric_slots(&["varp", "var", "stdevp", "stdev", "single"]);
    let bind = |config: CompilerConfig| {
        let mut builder =
            EngineBuilder::with_config(&book, Shape::new(), outputs.clone(), config).unwrap();
        builder
            .output("B1", "varp")
            .unwrap()
            .output("B2", "var")
            .unwrap()
            .output("B3", "stdevp")
            .unwrap()
            .output("B4", "stdev")
            .unwrap()
            .output("B5", "single")
            .unwrap();
        builder
    };

    let unfolded = config("double")
        .with_constant_folding(false)
        .with_inlining(false);
    let described = bind(unfolded).compile().unwrap().describe();
    assert!(described.contains("(let mean__1 = (fold("), "{}", described);

    for numeric in ["double", "decimal:6", "scaled:6"] {
        let engine = bind(config(numeric)).build().unwrap();
        let record = Record::new();
        let computation = engine.computation(&record);
        let get = |slot: &str| computation.get(slot).unwrap().to_f64().unwrap();
        assert!((get("varp") - 4.0).abs() < 1e-6, "{}", numeric);
        assert!((get("var") - 32.0 / 7.0).abs() < 1e-4, "{}", numeric);
        assert!((get("stdevp") - 2.0).abs() < 1e-6, "{}", numeric);
        assert!((get("stdev") - 2.13809).abs() < 1e-4, "{}", numeric);

        let err = computation.get("single").unwrap_err();
        assert_eq!(err.to_string(), "Division by zero (in cell B5)", "{}", numeric);
    }

    let mut builder = EngineBuilder::with_config(
        &book,
        Shape::new(),
        Shape::new().value("var", DataType::String),
        config("decimal:4"),
    )
    .unwrap();
    builder.output("B2", "var").unwrap();
    let engine = builder.build().unwrap();
    assert_eq!(
        engine.computation(&Record::new()).get("var").unwrap(),
        Value::text("4.5714")
    );
}

#[test]
fn test_conditional_aggregates() {
    let mut book = Spreadsheet::new();
    let sheet = book.sheet_mut(0).unwrap();
    for (row, (fruit, count)) in [("apple", 3.0), ("pear", 4.0), ("apple", 5.0), ("fig", 6.0)]
        .iter()
        .enumerate()
    {
        sheet.set_cell_value(&format!("A{}", row + 1), *fruit).unwrap();
        sheet.set_cell_value(&format!("B{}", row + 1), *count).unwrap();
    }
    sheet.set_cell_value("D1", 0.0).unwrap();
    sheet.set_cell_formula("C1", "=SUMIF(A1:A4,\"apple\",B1:B4)").unwrap();
    sheet.set_cell_formula("C2", "=COUNTIF(B1:B4,\">4\")").unwrap();
    sheet.set_cell_formula("C3", "=SUMIF(B1:B4,\"<>4\")").unwrap();
    sheet.set_cell_formula("C4", "=SUMIF(B1:B4,\">\"&D1)").unwrap();

    let mut builder = EngineBuilder::new(
        &book,
        numeric_slots(&["floor"]),
        numeric_slots(&["apples", "large", "not_four", "above"]),
    )
    .unwrap();
    builder.input("D1", "floor").unwrap();
    builder
        .output("C1", "apples")
        .unwrap()
        .output("C2", "large")
        .unwrap()
        .output("C3", "not_four")
        .unwrap()
        .output("C4", "above")
        .unwrap();
    let engine = builder.build().unwrap();

    let record = Record::new().with("floor", 3.0);
    let computation = engine.computation(&record);
    assert_eq!(computation.get("apples").unwrap(), Value::from(8.0));
    assert_eq!(computation.get("large").unwrap(), Value::from(2.0));
    assert_eq!(computation.get("not_four").unwrap(), Value::from(14.0));
    assert_eq!(computation.get("above").unwrap(), Value::from(15.0));

    let record = Record::new().with("floor", 5.0);
    let computation = engine.computation(&record);
    assert_eq!(computation.get("above").unwrap(), Value::from(6.0));
}

#[test]
fn test_database_functions() {
    let mut book = Spreadsheet::new();
    let sheet = book.sheet_mut(0).unwrap();
    let table = [
        ("Name", "Region", None),
        ("a", "north", Some(10.0)),
        ("b", "south", Some(20.0)),
        ("c", "north", Some(30.0)),
        ("d", "east", Some(40.0)),
    ];
    for (row, (name, region, sales)) in table.iter().enumerate() {
        sheet.set_cell_value(&format!("A{}", row + 1), *name).unwrap();
        sheet.set_cell_value(&format!("B{}", row + 1), *region).unwrap();
        match sales {
            Some(sales) => sheet.set_cell_value(&format!("C{}", row + 1), *sales).unwrap(),
            None => sheet.set_cell_value(&format!("C{}", row + 1), "Sales").unwrap(),
        }
    }
    sheet.set_cell_value("E1", "Region").unwrap();
    sheet.set_cell_value("F1", "Sales").unwrap();
    sheet.set_cell_value("E2", "north").unwrap();
    sheet.set_cell_value("F2", ">15").unwrap();
    sheet.set_cell_value("E3", "east").unwrap();

    let formulas = [
        ("H1", "=DSUM(A1:C5,\"Sales\",E1:F3)", "sum", 70.0),
        ("H2", "=DCOUNT(A1:C5,3,E1:F3)", "count", 2.0),
        ("H3", "=DAVERAGE(A1:C5,\"sales\",E1:F3)", "average", 35.0),
        ("H4", "=DMAX(A1:C5,\"Sales\",E1:F3)", "max", 40.0),
        ("H5", "=DMIN(A1:C5,\"Sales\",E1:F3)", "min", 30.0),
    ];
    for (cell, formula, _, _) in formulas {
        sheet.set_cell_formula(cell, formula).unwrap();
    }

    let slots: Vec<_> = formulas.iter().map(|(_, _, slot, _)| *slot).collect();
    let mut builder = EngineBuilder::new(&book, Shape::new(), numeric_slots(&slots)).unwrap();
    for (cell, _, slot, _) in formulas {
        builder.output(cell, slot).unwrap();
    }
    let engine = builder.build().unwrap();
    let record = Record::new();
    let computation = engine.computation(&record);
    for (_, formula, slot, expected) in formulas {
        assert_eq!(computation.get(slot).unwrap(), Value::from(expected), "{}", formula);
    }
}

#[test]
fn test_lookups() {
    let mut book = Spreadsheet::new();
    let sheet = book.sheet_mut(0).unwrap();
    for (row, (key, name)) in [(1.0, "one"), (2.0, "two"), (3.0, "three")].iter().enumerate() {
        sheet.set_cell_value(&format!("A{}", row + 1), *key).unwrap();
        sheet.set_cell_value(&format!("B{}", row + 1), *name).unwrap();
    }
    for (col, (key, name)) in ["G", "H", "I"].iter().zip([(10.0, "x"), (20.0, "y"), (30.0, "z")]) {
        sheet.set_cell_value(&format!("{}1", col), key).unwrap();
        sheet.set_cell_value(&format!("{}2", col), name).unwrap();
    }
    sheet.set_cell_value("D1", 0.0).unwrap();
    sheet.set_cell_formula("E1", "=VLOOKUP(D1,A1:B3,2)").unwrap();
    sheet.set_cell_formula("E2", "=VLOOKUP(D1,A1:B3,2,FALSE)").unwrap();
    sheet.set_cell_formula("E3", "=MATCH(\"three\",B1:B3,0)").unwrap();
    sheet.set_cell_formula("E4", "=CHOOSE(D1,\"a\",\"b\",\"c\")").unwrap();
    sheet.set_cell_formula("E5", "=HLOOKUP(20,G1:I2,2,FALSE)").unwrap();

    let outputs = Shape::new()
        .value("sorted", DataType::String)
        .value("exact", DataType::String)
        .value("position", DataType::Numeric)
        .value("chosen", DataType::String)
        .value("across", DataType::String);
    let mut builder = EngineBuilder::new(&book, numeric_slots(&["x"]), outputs).unwrap();
    builder.input("D1", "x").unwrap();
    builder
        .output("E1", "sorted")
        .unwrap()
        .output("E2", "exact")
        .unwrap()
        .output("E3", "position")
        .unwrap()
        .output("E4", "chosen")
        .unwrap()
        .output("E5", "across")
        .unwrap();
    let engine = builder.build().unwrap();

    let record = Record::new().with("x", 2.0);
    let computation = engine.computation(&record);
    assert_eq!(computation.get("sorted").unwrap(), Value::text("two"));
    assert_eq!(computation.get("exact").unwrap(), Value::text("two"));
    assert_eq!(computation.get("position").unwrap(), Value::from(3.0));
    assert_eq!(computation.get("chosen").unwrap(), Value::text("b"));
    assert_eq!(computation.get("across").unwrap(), Value::text("y"));

    let record = Record::new().with("x", 2.5);
    let computation = engine.computation(&record);
    assert_eq!(computation.get("sorted").unwrap(), Value::text("two"));
    let err = computation.get("exact").unwrap_err();
    assert!(err.to_string().contains("Value not available"), "{}", err);
    assert!(err.to_string().ends_with("(in cell E2)"), "{}", err);
}

#[test]
fn test_whole_sheet_range_touches_only_populated_cells() {
    let mut book = Spreadsheet::new();
    let sheet = book.sheet_mut(0).unwrap();
    sheet.set_cell_value("A1", 1.0).unwrap();
    sheet.set_cell_value("C3", 2.0).unwrap();
    sheet.set_cell_value("XFD1048000", 4.0).unwrap();
    sheet.set_cell_formula("A1048576", "=SUM(A1:XFD1048000)").unwrap();
    sheet.set_cell_formula("B1048576", "=COUNT(A1:XFD1048000)").unwrap();

    let mut builder =
        EngineBuilder::new(&book, Shape::new(), numeric_slots(&["total", "count"])).unwrap();
    builder
        .output("A1048576", "total")
        .unwrap()
        .output("B1048576", "count")
        .unwrap();
    let model = builder.compile().unwrap();
    assert!(model.exprs().len() < 64, "{}", model.exprs().len());

    let mut builder =
        EngineBuilder::new(&book, Shape::new(), numeric_slots(&["total", "count"])).unwrap();
    builder
        .output("A1048576", "total")
        .unwrap()
        .output("B1048576", "count")
        .unwrap();
    let record = Record::new();
    let computation = builder.build().unwrap().computation(&record);
    assert_eq!(computation.get("total").unwrap(), Value::from(7.0));
    assert_eq!(computation.get("count").unwrap(), Value::from(3.0));
}

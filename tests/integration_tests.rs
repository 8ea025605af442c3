use account_views::*;
use std::fs;

fn workbook_json() -> &'static str {
    r#"{
        "dataSources": {
            "Real": {
                "periods": ["2024-01", "2024-02", "2024-03"],
                "records": [
                    {"code": "R1", "description": "Vendas", "valuesByPeriod": {"2024-01": 100, "2024-02": 120, "2024-03": 90}},
                    {"code": "R2", "valuesByPeriod": {"2024-01": "40", "2024-02": 50.5, "2024-03": null}},
                    {"code": "R3", "valuesByPeriod": {"2024-01": true}},
                    {"code": "R9", "valuesByPeriod": {"2024-01": 0, "2024-02": 0, "2024-03": 0}}
                ]
            },
            "Orcado": {
                "periods": ["2024-01"],
                "records": [
                    {"code": "B1", "valuesByPeriod": {"2024-01": 110}},
                    {"code": "B2", "valuesByPeriod": {"2024-01": 45}}
                ]
            }
        },
        "charts": {
            "Gerencial": {
                "accounts": [
                    {"code": "1", "description": "Receita", "rawTypeLabel": "sintetica"},
                    {"code": "1.1", "description": "Vendas", "rawTypeLabel": "analitica",
                     "dataSourceLinks": {"Real": "R1", "Orcado": "B1"}},
                    {"code": "2", "description": "Custos", "rawTypeLabel": "sintetica"},
                    {"code": "2.1", "description": "CMV", "rawTypeLabel": "analitica",
                     "dataSourceLinks": {"Real": "R2; R3", "Orcado": "B2"}},
                    {"code": "2.2", "description": "Sem movimento", "rawTypeLabel": "analitica",
                     "dataSourceLinks": {"Real": "R9"}},
                    {"code": "3", "description": "Margem", "rawTypeLabel": "calculo (1 - 2)"},
                    {"code": "4", "description": "Margem %", "rawTypeLabel": "calculo (3 * 100 / 1)"},
                    {"code": "5", "description": "Nada", "rawTypeLabel": "calculo (2.2 * 2)"}
                ],
                "dataSources": ["Real", "Orcado"]
            },
            "Resumo": {
                "accounts": [
                    {"code": "1", "rawTypeLabel": "analitica", "dataSourceLinks": {"Real": "R2"}},
                    {"code": "9", "rawTypeLabel": "calculo (1 * 2)"}
                ]
            }
        }
    }"#
}

fn workbook() -> Workbook {
    serde_json::from_str(workbook_json()).unwrap()
}

#[test]
fn test_views_per_chart_and_source() {
    let document = process_workbook(&workbook(), &ProcessingOptions::default()).unwrap();

    let pairs: Vec<(&str, &str)> = document
        .calculated_views
        .iter()
        .map(|v| (v.plan_name.as_str(), v.data_source_name.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![("Gerencial", "Orcado"), ("Gerencial", "Real"), ("Resumo", "Real")]
    );
}

#[test]
fn test_values_over_periods() {
    let document = process_workbook(&workbook(), &ProcessingOptions::default()).unwrap();
    let real = document.view("Gerencial", "Real").unwrap();

    assert_eq!(real.periods, vec!["2024-01", "2024-02", "2024-03"]);

    let cost = &real.account("2.1").unwrap().values;
    assert_eq!(cost["2024-01"], 41.0);
    assert_eq!(cost["2024-02"], 50.5);
    assert_eq!(cost["2024-03"], 0.0);

    let margin = &real.account("3").unwrap().values;
    assert_eq!(margin["2024-01"], 59.0);
    assert_eq!(margin["2024-02"], 69.5);
    assert_eq!(margin["2024-03"], 90.0);

    assert_eq!(real.account("4").unwrap().values["2024-01"], 59.0);

    let budget = document.view("Gerencial", "Orcado").unwrap();
    assert_eq!(budget.account("3").unwrap().values["2024-01"], 65.0);
}

#[test]
fn test_zero_suppression() {
    let document = process_workbook(&workbook(), &ProcessingOptions::default()).unwrap();
    let real = document.view("Gerencial", "Real").unwrap();

    assert!(real.account("2.2").is_none());
    let formula = real.account("5").unwrap();
    assert!(formula.values.values().all(|v| *v == 0.0));

    // 2.2 has no link for Orcado, so it is suppressed there as well.
    let budget = document.view("Gerencial", "Orcado").unwrap();
    assert!(budget.account("2.2").is_none());
}

#[test]
fn test_charts_do_not_share_cached_values() {
    // Code "1" rolls up R1 in Gerencial but links R2 directly in Resumo.
    let mut reversed = workbook();
    reversed.charts.reverse();

    for workbook in [workbook(), reversed] {
        let document = process_workbook(&workbook, &ProcessingOptions::default()).unwrap();
        let gerencial = document.view("Gerencial", "Real").unwrap();
        let resumo = document.view("Resumo", "Real").unwrap();

        let gerencial_1 = &gerencial.account("1").unwrap().values;
        assert_eq!(gerencial_1["2024-01"], 100.0);
        assert_eq!(gerencial_1["2024-02"], 120.0);

        let resumo_1 = &resumo.account("1").unwrap().values;
        assert_eq!(resumo_1["2024-01"], 40.0);
        assert_eq!(resumo_1["2024-02"], 50.5);

        let resumo_9 = &resumo.account("9").unwrap().values;
        assert_eq!(resumo_9["2024-01"], 80.0);
        assert_eq!(resumo_9["2024-02"], 101.0);

        assert_eq!(gerencial.account("3").unwrap().values["2024-02"], 69.5);
    }
}

#[test]
fn test_serialized_document_keeps_values() {
    let options = ProcessingOptions::default();
    let document = process_workbook(&workbook(), &options).unwrap();

    let json = sink::to_json_string(&document, options.json_indent).unwrap();
    let parsed: ViewsDocument = serde_json::from_str(&json).unwrap();

    for (before, after) in document.calculated_views.iter().zip(&parsed.calculated_views) {
        assert_eq!(before.value_triples(), after.value_triples());
        assert_eq!(before.periods, after.periods);
    }
    assert_eq!(parsed.timestamp_utc, document.timestamp_utc);
}

#[test]
fn test_csv_directory_workbook() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("dados (Real).csv"),
        "Codigo,Descricao,2024-01,2024-02\nR1,Vendas,100,120\nR2,Custos,40,\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("plano (Gerencial).csv"),
        "Codigo,Descricao,Tipo,Conta (Real)\n\
         1,Receita,analitica,R1\n\
         2,Custos,analitica,R2\n\
         3,Margem,calculo (1 - 2),\n",
    )
    .unwrap();
    fs::write(dir.path().join("~$dados (Lock).csv"), "garbage").unwrap();
    fs::write(dir.path().join("readme.txt"), "not a sheet").unwrap();

    let options = ProcessingOptions::default();
    let workbook = load_csv_workbook(dir.path(), &options).unwrap();
    assert_eq!(workbook.data_sources.len(), 1);

    let document = process_workbook(&workbook, &options).unwrap();
    let view = document.view("Gerencial", "Real").unwrap();
    assert_eq!(view.account("3").unwrap().values["2024-01"], 60.0);
    assert_eq!(view.account("3").unwrap().values["2024-02"], 120.0);
}

#[test]
fn test_repeated_csv_headers_keep_every_view() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("dados (Real).csv"),
        "Codigo,Descricao,2024-01,Total,Total\nR1,Vendas,100,100,1\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("dados (Orcado).csv"),
        "Codigo,Descricao,2024-01\nB1,Vendas,90\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("plano (Gerencial).csv"),
        "Codigo,Descricao,Tipo,Conta (Real),Conta (Orcado)\n1,Receita,analitica,R1,B1\n",
    )
    .unwrap();

    let options = ProcessingOptions::default();
    let workbook = load_csv_workbook(dir.path(), &options).unwrap();
    let document = process_workbook(&workbook, &options).unwrap();
    assert_eq!(document.calculated_views.len(), 2);

    let real = document.view("Gerencial", "Real").unwrap();
    assert_eq!(real.periods, vec!["2024-01", "Total", "Total.1"]);
    assert_eq!(real.account("1").unwrap().values["Total.1"], 1.0);

    let budget = document.view("Gerencial", "Orcado").unwrap();
    assert_eq!(budget.account("1").unwrap().values["2024-01"], 90.0);
}

#[test]
fn test_html_page_is_patched() {
    let dir = tempfile::tempdir().unwrap();
    let page = dir.path().join("index.html");
    fs::write(
        &page,
        "<html><script>\nconst calculatedViewsData = {\"calculated_views\": []};\nrender(calculatedViewsData);\n</script></html>",
    )
    .unwrap();

    let options = ProcessingOptions::default();
    let sink = HtmlSink::new(&page, options.js_variable_name.clone(), options.json_indent);
    let document = process_workbook_into(&workbook(), &options, &sink).unwrap();

    let html = fs::read_to_string(&page).unwrap();
    assert!(html.contains("\"plan_name\": \"Gerencial\""));
    assert!(html.contains("render(calculatedViewsData);"));
    assert!(html.contains(&document.timestamp_utc));
    assert_eq!(html.matches("const calculatedViewsData").count(), 1);
}

#[test]
fn test_json_sink_and_missing_source() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("views.json");

    let options = ProcessingOptions::default();
    let sink = JsonFileSink::new(&output, options.json_indent);
    process_workbook_into(&workbook(), &options, &sink).unwrap();

    let parsed: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(parsed["calculated_views"].as_array().unwrap().len(), 3);

    assert!(matches!(
        load_json_workbook(&dir.path().join("missing.json")),
        Err(AccountViewError::SourceUnavailable { .. })
    ));
}

#[test]
fn test_workbook_schema_names_feeds() {
    let schema = Workbook::schema_as_json().unwrap();
    assert!(schema.contains("dataSources"));
    assert!(schema.contains("rawTypeLabel"));
}

use account_views::{
    process_workbook, AccountRow, ChartFeed, DataSourceFeed, ProcessingOptions, RawDataPoint,
    RawValue, Workbook,
};
use indexmap::IndexMap;

fn raw(code: &str, description: &str, values: &[f64], periods: &[&str]) -> RawDataPoint {
    RawDataPoint {
        code: Some(code.to_string()),
        description: Some(description.to_string()),
        values_by_period: periods
            .iter()
            .zip(values)
            .map(|(p, v)| (p.to_string(), Some(RawValue::Number(*v))))
            .collect(),
    }
}

fn account(code: &str, description: &str, label: &str, links: &[(&str, &str)]) -> AccountRow {
    AccountRow {
        code: Some(code.to_string()),
        description: Some(description.to_string()),
        raw_type_label: Some(label.to_string()),
        data_source_links: links
            .iter()
            .map(|(s, c)| (s.to_string(), c.to_string()))
            .collect(),
    }
}

fn main() {
    env_logger::init();

    let periods = ["2024-Q1", "2024-Q2", "2024-Q3", "2024-Q4"];

    let mut data_sources = IndexMap::new();
    data_sources.insert(
        "Realizado".to_string(),
        DataSourceFeed {
            periods: periods.iter().map(|p| p.to_string()).collect(),
            records: vec![
                raw("3.01", "Receita de produtos", &[420_000.0, 455_000.0, 430_000.0, 510_000.0], &periods),
                raw("3.02", "Receita de servicos", &[80_000.0, 82_500.0, 90_000.0, 95_000.0], &periods),
                raw("4.01", "Custo dos produtos", &[210_000.0, 230_000.0, 221_000.0, 250_000.0], &periods),
                raw("5.01", "Despesas administrativas", &[60_000.0, 61_000.0, 59_500.0, 70_000.0], &periods),
                raw("5.02", "Despesas comerciais", &[35_000.0, 38_000.0, 36_000.0, 44_000.0], &periods),
            ],
        },
    );

    let accounts = vec![
        account("1", "Receita bruta", "sintetica", &[]),
        account("1.1", "Produtos", "analitica", &[("Realizado", "3.01")]),
        account("1.2", "Servicos", "analitica", &[("Realizado", "3.02")]),
        account("2", "Custos", "sintetica", &[]),
        account("2.1", "CPV", "analitica", &[("Realizado", "4.01")]),
        account("3", "Lucro bruto", "calculo (1 - 2)", &[]),
        account("4", "Despesas operacionais", "sintetica", &[]),
        account("4.1", "Administrativas", "analitica", &[("Realizado", "5.01")]),
        account("4.2", "Comerciais", "analitica", &[("Realizado", "5.02")]),
        account("4.3", "Pesquisa", "analitica", &[("Realizado", "6.01")]),
        account("5", "EBITDA", "calculo (3 - 4)", &[]),
        account("6", "Margem EBITDA %", "calculo (5 / 1 * 100)", &[]),
    ];

    let mut charts = IndexMap::new();
    charts.insert(
        "DRE Gerencial".to_string(),
        ChartFeed {
            accounts,
            data_sources: vec!["Realizado".to_string()],
        },
    );

    let workbook = Workbook {
        data_sources,
        charts,
    };

    let document = match process_workbook(&workbook, &ProcessingOptions::default()) {
        Ok(document) => document,
        Err(e) => {
            eprintln!("Processing failed: {}", e);
            std::process::exit(1);
        }
    };

    for view in &document.calculated_views {
        println!("{} / {}", view.plan_name, view.data_source_name);

        print!("{:<6} {:<26}", "Code", "Account");
        for period in &view.periods {
            print!(" {:>14}", period);
        }
        println!();

        for account in &view.accounts {
            let indent = "  ".repeat(account.level.saturating_sub(1));
            let label = format!("{}{}", indent, account.description.as_deref().unwrap_or(""));
            print!("{:<6} {:<26}", account.code, label);
            for period in &view.periods {
                print!(" {:>14.2}", account.values[period]);
            }
            println!();
        }
        println!();
    }

    println!("Generated at {}", document.timestamp_local);
}

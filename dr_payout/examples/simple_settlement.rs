use chrono::{Datelike, Duration, NaiveDate, Timelike, Weekday};
use dr_payout::{
    EventWindow, IntervalSeries, PriceSchedule, Settlement, SettlementConfig, SiteMetadata,
};

fn main() {
    env_logger::init();

    // One event on Tuesday 2022-06-14, 14:00 to 18:00
    let event_start = NaiveDate::from_ymd_opt(2022, 6, 14)
        .unwrap()
        .and_hms_opt(14, 0, 0)
        .unwrap();
    let event = EventWindow::new(event_start, event_start + Duration::hours(4)).unwrap();

    let prices = PriceSchedule::new(vec![
        (event_start, 1500.0),
        (event_start + Duration::hours(1), 1800.0),
        (event_start + Duration::hours(2), 3000.0),
        (event_start + Duration::hours(3), 780.0),
    ])
    .unwrap();

    // Four weeks of 15-minute readings:
    // Weekdays: 250 kWh per interval (1000 kWh per hour)
    // Weekends: 100 kWh per interval
    // Event hours: 200 kWh per interval (800 kWh per hour)
    let first = event_start.date() - Duration::days(28);
    let readings: Vec<_> = (0..29 * 96)
        .map(|i| {
            let ts = first.and_hms_opt(0, 0, 0).unwrap() + Duration::minutes(15 * i);
            let kwh = if event.contains(ts) {
                200.0
            } else if matches!(ts.weekday(), Weekday::Sat | Weekday::Sun) {
                100.0
            } else {
                250.0
            };
            (ts, kwh)
        })
        .filter(|(ts, _)| ts.date() < event_start.date() || ts.hour() < 18)
        .collect();
    let history = IntervalSeries::new(15, readings).unwrap();

    let site = SiteMetadata {
        site_id: "EXAMPLE_SITE".to_string(),
        fsl_baseline: 1100.0,
        profit_share: 0.64,
    };

    let settlement = Settlement::new(event, prices, SettlementConfig::default()).unwrap();
    let result = settlement.settle_site(&site, &history).unwrap();

    println!("Demand Response Settlement");
    println!("==========================");
    println!("Site: {}", result.site_id);
    println!("Event: {} to {}", event.start(), event.end());
    println!("Profit share: {:.0}%", result.profit_share * 100.0);
    println!();
    println!("FSL baseline:      {:.2} kWh", result.fsl_baseline);
    println!("10-of-10 baseline: {:.2} kWh", result.ten_of_ten_mean);
    println!("Avg performance (10 of 10): {:.2} kWh", result.avg_performance_ten_of_ten);
    println!("Avg performance (FSL):      {:.2} kWh", result.avg_performance_fsl);
    println!();
    println!("Hourly payouts ({} baseline):", result.payout_baseline);
    for hour in result.payout.hours() {
        println!(
            "  {}  perf {:>8.2}  revenue ${:>8.2}  customer ${:>8.2}  aggregator ${:>8.2}",
            hour.hour.format("%H:%M"),
            hour.performance,
            hour.revenue,
            hour.customer_share,
            hour.aggregator_share
        );
    }
    println!();
    println!("Revenue:          ${:.2}", result.revenue());
    println!("Customer share:   ${:.2}", result.customer_share());
    println!("Aggregator share: ${:.2}", result.aggregator_share());
}

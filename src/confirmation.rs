//! Subject and HTML body of the booking confirmation mail.

use crate::booker::{BookingRequest, DEFAULT_SEMESTER};

pub fn subject(request: &BookingRequest, ticket_id: &str) -> String {
    format!(
        "Your ticket for {} - {}",
        request.event_name.as_str(),
        ticket_id
    )
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn row(label: &str, value: &str) -> String {
    format!(
        r#"<tr><td style="padding: 6px 12px; color: #666;">{label}</td><td style="padding: 6px 12px; font-weight: bold;">{}</td></tr>"#,
        escape(value)
    )
}

/// `with_attachment` tells whether the screenshot went along as a file, in
/// which case a screenshot URL is not mentioned.
pub fn html_body(request: &BookingRequest, ticket_id: &str, with_attachment: bool) -> String {
    let mut attendee = vec![
        row("Name", &request.name),
        row("Email", &request.email),
        row("Phone", &request.phone),
        row("Branch", &request.branch),
    ];
    if request.semester != DEFAULT_SEMESTER {
        attendee.push(row("Semester", &request.semester));
    }

    let event = [
        row("Event", &request.event_name),
        row("Date", &request.event_date),
        row("Time", &request.event_time),
        row("Venue", &request.event_venue),
    ];

    let screenshot_note = match (&request.screenshot_url, with_attachment) {
        (Some(url), false) => format!(
            r#"<p style="color: #666; font-size: 14px;">Payment screenshot submitted as a link: <a href="{url}">{url}</a></p>"#,
            url = escape(url)
        ),
        _ => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Booking confirmed</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <h2 style="color: #2563eb;">Your booking is confirmed!</h2>
        <p>Hi {name}, thank you for booking a ticket for <strong>{event_name}</strong>.</p>
        <div style="background-color: #f3f4f6; border-radius: 8px; padding: 16px; margin: 24px 0; text-align: center;">
            <div style="color: #666; font-size: 13px;">Ticket ID</div>
            <div style="font-size: 24px; font-weight: bold; letter-spacing: 2px;">{ticket_id}</div>
        </div>
        <h3>Event details</h3>
        <table>{event}</table>
        <h3>Attendee details</h3>
        <table>{attendee}</table>
        {screenshot_note}
        <p style="color: #666; font-size: 12px; margin-top: 40px;">
            Please show this email and your ticket ID at the entrance.
        </p>
    </div>
</body>
</html>"#,
        name = escape(&request.name),
        event_name = escape(&request.event_name),
        ticket_id = escape(ticket_id),
        event = event.concat(),
        attendee = attendee.concat(),
    )
}

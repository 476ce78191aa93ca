use crate::attendance::{AttendanceStatus, DayMarks};
use crate::roster::Student;

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub fn attendance_csv_filename(date: &str) -> String {
    format!("attendance_{}.csv", date)
}

/// One row per filtered student; unmarked students export as the
/// literal `Not Marked`.
pub fn build_attendance_csv(filtered: &[&Student], marks: &DayMarks) -> String {
    let mut csv = String::from("Roll No,Student Name,Class,Status\n");
    for student in filtered {
        let status = match marks.get(&student.id) {
            Some(AttendanceStatus::Present) => "Present",
            Some(AttendanceStatus::Absent) => "Absent",
            None => "Not Marked",
        };
        csv.push_str(&format!(
            "{},{},{},{}\n",
            csv_quote(student.roll_number.as_deref().unwrap_or("")),
            csv_quote(&student.name),
            csv_quote(&student.enrolled_class),
            status
        ));
    }
    csv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: &str, name: &str, roll: &str, class: &str) -> Student {
        Student {
            id: id.to_string(),
            name: name.to_string(),
            roll_number: Some(roll.to_string()),
            enrolled_class: class.to_string(),
            phone: None,
            join_date: None,
        }
    }

    #[test]
    fn header_rows_and_not_marked_fallback() {
        let roster = vec![
            student("1", "Amara Okafor", "AS-101", "Pottery"),
            student("2", "Liam Reyes", "AS-102", "Pottery"),
        ];
        let filtered: Vec<&Student> = roster.iter().collect();
        let mut marks = DayMarks::new();
        marks.insert("1".to_string(), AttendanceStatus::Present);

        let csv = build_attendance_csv(&filtered, &marks);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Roll No,Student Name,Class,Status");
        assert_eq!(lines[1], "AS-101,Amara Okafor,Pottery,Present");
        assert_eq!(lines[2], "AS-102,Liam Reyes,Pottery,Not Marked");
    }

    #[test]
    fn fields_with_commas_are_quoted() {
        let roster = vec![student("1", "Okafor, Amara", "AS-101", "Pottery")];
        let filtered: Vec<&Student> = roster.iter().collect();
        let csv = build_attendance_csv(&filtered, &DayMarks::new());
        assert!(csv.contains("\"Okafor, Amara\""));
    }

    #[test]
    fn filename_pattern_embeds_the_date() {
        assert_eq!(attendance_csv_filename("2026-01-10"), "attendance_2026-01-10.csv");
    }
}

use expense_tracker::bot::dialogue_manager::error_reply;
use expense_tracker::bot::ui_builder::{
    build_grid, build_pagination_rows, category_keyboard, to_inline_markup, undo_keyboard,
    KeyboardButton,
};
use expense_tracker::callback::{self, Callback, Direction, MAX_CALLBACK_DATA_LEN};
use expense_tracker::errors::{BotError, CallbackError, KeyboardError, ParseError};
use expense_tracker::localization::t_lang;
use expense_tracker::store::Category;

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(rows: &[Vec<KeyboardButton>]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|b| b.label.clone()).collect())
            .collect()
    }

    fn categories(n: usize) -> Vec<Category> {
        (1..=n)
            .map(|i| Category {
                id: i as i32,
                name: format!("Category {i}"),
                transaction_type_id: 1,
            })
            .collect()
    }

    #[test]
    fn test_category_keyboard_layout() {
        let rows = category_keyboard(&categories(7), 11, 3, None).unwrap();

        let widths: Vec<usize> = rows.iter().map(Vec::len).collect();
        assert_eq!(widths, vec![3, 3, 1, 1]);
        assert_eq!(labels(&rows)[3], vec![t_lang("button-cancel", None)]);

        // Row-major order
        let second = callback::decode(&rows[0][1].data).unwrap();
        assert_eq!(
            second,
            Callback::Category {
                category_id: 2,
                message_context_id: 11
            }
        );
    }

    #[test]
    fn test_grid_rejects_zero_columns() {
        let items = vec![KeyboardButton {
            label: "a".into(),
            data: "a".into(),
        }];
        assert_eq!(build_grid(items, 0), Err(KeyboardError::InvalidColumns));
    }

    #[test]
    fn test_pagination_first_of_many() {
        let rows = build_pagination_rows(25, 0, 10, 5, 2, None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 1);
        assert_eq!(
            callback::decode(&rows[0][0].data).unwrap(),
            Callback::Pagination {
                direction: Direction::Next,
                offset: 10,
                limit: 10,
                message_context_id: 5
            }
        );
    }

    #[test]
    fn test_pagination_middle_page() {
        let rows = build_pagination_rows(25, 10, 10, 5, 2, None).unwrap();
        assert_eq!(
            labels(&rows)[0],
            vec![t_lang("button-previous", None), t_lang("button-next", None)]
        );
    }

    #[test]
    fn test_pagination_last_page() {
        let rows = build_pagination_rows(25, 20, 10, 5, 2, None).unwrap();
        assert_eq!(rows[0].len(), 1);
        assert_eq!(
            callback::decode(&rows[0][0].data).unwrap(),
            Callback::Pagination {
                direction: Direction::Previous,
                offset: 10,
                limit: 10,
                message_context_id: 5
            }
        );
    }

    #[test]
    fn test_pagination_exact_single_page() {
        let rows = build_pagination_rows(10, 0, 10, 5, 2, None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(labels(&rows), vec![vec![t_lang("button-cancel", None)]]);
    }

    #[test]
    fn test_pagination_empty_and_invalid() {
        assert!(build_pagination_rows(0, 0, 10, 5, 2, None).unwrap().is_empty());
        assert!(matches!(
            build_pagination_rows(10, 0, 0, 5, 2, None),
            Err(BotError::Keyboard(KeyboardError::InvalidLimit))
        ));
    }

    #[test]
    fn test_undo_keyboard() {
        let rows = undo_keyboard(77, 3, None).unwrap();
        assert_eq!(
            callback::decode(&rows[0][0].data).unwrap(),
            Callback::Undo { transaction_id: 77 }
        );
        assert_eq!(
            callback::decode(&rows[1][0].data).unwrap(),
            Callback::Cancel {
                message_context_id: 3
            }
        );
    }

    #[test]
    fn test_inline_markup_conversion() {
        let rows = category_keyboard(&categories(4), 1, 2, None).unwrap();
        let markup = to_inline_markup(&rows);
        assert_eq!(markup.inline_keyboard.len(), 3);
        assert_eq!(markup.inline_keyboard[0][0].text, "Category 1");
    }

    #[test]
    fn test_worst_case_callbacks_fit() {
        let worst = [
            Callback::Category {
                category_id: i32::MIN,
                message_context_id: i32::MIN,
            },
            Callback::TransactionType {
                transaction_type_id: i32::MIN,
                message_context_id: i32::MIN,
            },
            Callback::Pagination {
                direction: Direction::Previous,
                offset: u32::MAX,
                limit: u32::MAX,
                message_context_id: i32::MIN,
            },
            Callback::Undo {
                transaction_id: i64::MIN,
            },
            Callback::Cancel {
                message_context_id: i32::MIN,
            },
        ];
        for cb in worst {
            let encoded = callback::encode(&cb).unwrap();
            assert!(encoded.len() <= MAX_CALLBACK_DATA_LEN, "{encoded}");
            assert_eq!(callback::decode(&encoded).unwrap(), cb);
        }
    }

    #[test]
    fn test_decode_rejections() {
        assert!(matches!(
            callback::decode("Category||abc"),
            Err(CallbackError::Malformed(_))
        ));
        assert!(matches!(
            callback::decode(r#"{"t":"zz"}"#),
            Err(CallbackError::UnrecognisedType(_))
        ));
        assert!(matches!(
            callback::decode(r#"{"id":3}"#),
            Err(CallbackError::Malformed(_))
        ));
        assert!(matches!(
            callback::decode(r#"{"t":"c","id":"three","m":1}"#),
            Err(CallbackError::Malformed(_))
        ));
        assert!(matches!(callback::decode(""), Err(CallbackError::Malformed(_))));
    }

    #[test]
    fn test_legacy_undo_still_decodes() {
        assert_eq!(
            callback::decode("Undo||42").unwrap(),
            Callback::Undo { transaction_id: 42 }
        );
    }

    #[test]
    fn test_error_replies() {
        assert_eq!(
            error_reply(&ParseError::NoAmountFound.into(), None),
            t_lang("amount-not-recognised", None)
        );
        assert!(error_reply(
            &ParseError::DescriptionTooLong { max: 50, actual: 51 }.into(),
            None
        )
        .contains("50"));
        assert_eq!(
            error_reply(&CallbackError::PayloadTooLarge(90).into(), None),
            t_lang("generic-error", None)
        );
        assert_eq!(
            error_reply(&BotError::UserNotRegistered(1), None),
            t_lang("not-registered", None)
        );
    }
}
